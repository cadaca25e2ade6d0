use crate::utils::error::{PriceToggleError, Result};
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "price-toggle")]
#[command(about = "Convert prices on saved product pages between currencies")]
pub struct CliArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Convert every price in an HTML page and write the result
    Convert {
        #[arg(long)]
        input: PathBuf,

        /// Use this rate instead of the rate service
        #[arg(long, conflicts_with = "fetch")]
        rate: Option<f64>,

        /// Fetch a fresh rate before converting
        #[arg(long)]
        fetch: bool,

        /// Output file, stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the price elements found in an HTML page
    Scan {
        #[arg(long)]
        input: PathBuf,
    },
    /// Show the current exchange rate
    Rate {
        #[arg(long, help = "Bypass the cache and fetch a new rate")]
        refresh: bool,
    },
}

impl Validate for CliArgs {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Convert { input, rate, output, .. } => {
                validation::validate_path("input", &input.to_string_lossy())?;
                if let Some(rate) = rate {
                    validation::validate_positive_rate("rate", *rate)?;
                }
                if let Some(output) = output {
                    if output == input {
                        return Err(PriceToggleError::InvalidConfigValueError {
                            field: "output".to_string(),
                            value: output.display().to_string(),
                            reason: "Output must not overwrite the input page".to_string(),
                        });
                    }
                }
                Ok(())
            }
            Command::Scan { input } => validation::validate_path("input", &input.to_string_lossy()),
            Command::Rate { .. } => Ok(()),
        }
    }
}
