use price_toggle::adapters::channel::{ChannelNotifier, LocalTab};
use price_toggle::dom::html::append_fragment;
use price_toggle::dom::SelectorList;
use price_toggle::domain::messages::{ContentRequest, ContentResponse, Notification};
use price_toggle::domain::model::ConversionState;
use price_toggle::domain::ports::ContentChannel;
use price_toggle::{parse_document, AppConfig, ContentSession};
use std::sync::Arc;

const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Laptopuri</title></head>
<body>
<div id="grid">
  <div class="card"><h2>Laptop A</h2><p class="product-new-price">2.499,<sup>99</sup> Lei</p></div>
  <div class="card"><h2>Laptop B</h2><span class="price">de la 100 Lei</span></div>
  <div class="card"><h2>Cablu</h2><span class="price">Stoc epuizat</span></div>
</div>
</body></html>"#;

fn session_with(html: &str) -> (ContentSession, tokio::sync::mpsc::UnboundedReceiver<Notification>) {
    let (notifier, rx) = ChannelNotifier::new();
    let session = ContentSession::new(parse_document(html), &AppConfig::default(), false, Arc::new(notifier)).unwrap();
    (session, rx)
}

fn texts(session: &ContentSession, selector: &str) -> Vec<String> {
    let doc = session.document();
    let selectors = SelectorList::parse(selector).unwrap();
    doc.select(doc.body(), &selectors)
        .into_iter()
        .map(|n| doc.inner_text(n))
        .collect()
}

#[tokio::test]
async fn test_convert_and_restore_page() {
    let (session, mut rx) = session_with(PRODUCT_PAGE);
    let original_texts = texts(&session, ".product-new-price, .price");
    let tab = LocalTab::new(session);

    let response = tab
        .send(ContentRequest::ConvertCurrency { exchange_rate: 0.22 })
        .await
        .unwrap();
    assert_eq!(response, ContentResponse::ack(true));
    assert_eq!(rx.recv().await, Some(Notification::ConversionComplete { count: 2 }));

    tab.with_session(|session| {
        let converted = texts(session, ".product-new-price, .price");
        assert_eq!(converted, vec!["$550.00 USD", "$22.00 USD", "Stoc epuizat"]);
        assert_eq!(
            texts(session, ".price-toggle-original"),
            vec!["2.499,99 Lei", "de la 100 Lei"]
        );
        let doc = session.document();
        let p = doc.select(doc.body(), &SelectorList::parse("p.product-new-price").unwrap())[0];
        assert_eq!(doc.attr(p, "data-original-price"), Some("2.499,99 Lei"));
        assert_eq!(doc.attr(p, "data-converted"), Some("true"));
    })
    .await
    .unwrap();

    let state = tab.send(ContentRequest::GetConversionState).await.unwrap();
    assert_eq!(
        state,
        ContentResponse::State(ConversionState {
            is_converted: true,
            current_rate: Some(0.22),
            auto_convert_enabled: false,
        })
    );

    let response = tab.send(ContentRequest::RestoreOriginalPrices).await.unwrap();
    assert!(response.is_success());
    assert_eq!(rx.recv().await, Some(Notification::PricesRestored { count: 2 }));

    let session = tab.close().await.unwrap();
    assert_eq!(texts(&session, ".product-new-price, .price"), original_texts);
    assert!(texts(&session, ".price-toggle-wrapper").is_empty());
    assert!(!session.conversion_state().is_converted);
    // the sup element is back, not flattened to text
    let doc = session.document();
    assert_eq!(doc.select(doc.body(), &SelectorList::parse("p > sup").unwrap()).len(), 1);
}

#[tokio::test]
async fn test_convert_is_idempotent_and_reconverts_on_rate_change() {
    let (mut session, mut rx) = session_with(PRODUCT_PAGE);

    assert_eq!(session.convert(0.22).unwrap(), 2);
    let html = session.document().to_html();
    assert_eq!(session.convert(0.22).unwrap(), 0);
    assert_eq!(session.document().to_html(), html);

    assert_eq!(session.convert(0.2).unwrap(), 2);
    assert_eq!(texts(&session, ".price")[0], "$20.00 USD");

    let counts: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(
        counts,
        vec![
            Notification::ConversionComplete { count: 2 },
            Notification::ConversionComplete { count: 0 },
            Notification::ConversionComplete { count: 2 },
        ]
    );
}

#[tokio::test]
async fn test_inserted_products_follow_converted_page() {
    let (mut session, _rx) = session_with(PRODUCT_PAGE);
    session.convert(0.22).unwrap();

    let grid = {
        let doc = session.document();
        doc.select(doc.body(), &SelectorList::parse("#grid").unwrap())[0]
    };
    append_fragment(
        session.document_mut(),
        grid,
        r#"<div class="card"><h2>Mouse</h2><span class="price">50 lei</span></div>"#,
    );

    let report = session.on_mutations().unwrap();
    assert_eq!(report.converted, 1);
    assert_eq!(report.unchanged, 2);
    assert!(texts(&session, ".price").contains(&"$11.00 USD".to_string()));

    // the rescan's own writes are not fed back as a new batch
    assert!(session.on_mutations().is_none());
}

#[tokio::test]
async fn test_inserted_products_stay_original_after_restore() {
    let (mut session, _rx) = session_with(PRODUCT_PAGE);
    session.convert(0.22).unwrap();
    session.restore();

    let grid = {
        let doc = session.document();
        doc.select(doc.body(), &SelectorList::parse("#grid").unwrap())[0]
    };
    append_fragment(session.document_mut(), grid, r#"<span class="price">50 lei</span>"#);
    assert!(session.on_mutations().is_none());
    assert!(texts(&session, ".price").contains(&"50 lei".to_string()));
}

#[tokio::test]
async fn test_round_trip_after_rate_change() {
    let (mut session, _rx) = session_with(PRODUCT_PAGE);
    let before = texts(&session, ".product-new-price, .price");

    session.convert(0.22).unwrap();
    session.convert(0.25).unwrap();
    session.restore();

    assert_eq!(texts(&session, ".product-new-price, .price"), before);
}

#[tokio::test]
async fn test_saved_page_keeps_scripts_and_comments() {
    let page = r#"<html><head><script>if (a && b < c) { render(); }</script></head><body><!-- grid --><p class="price">100 Lei</p></body></html>"#;
    let (mut session, _rx) = session_with(page);
    session.convert(0.22).unwrap();

    let html = session.document().to_html();
    assert!(html.contains("<script>if (a && b < c) { render(); }</script>"));
    assert!(html.contains("<!-- grid -->"));
    assert!(html.contains("$22.00 USD"));
}
