//! #[record] 宏生成编解码的集成测试

use rill::macros::record;
use rill::record::Record;

#[record]
struct Trade {
    symbol: String,
    qty: u32,
    price: f64,
}

fn field_map(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn generated_fields_follow_declaration_order() {
    let trade = Trade {
        symbol: "BTC".to_owned(),
        qty: 3,
        price: 64000.5,
    };
    let fields = trade.to_fields();
    assert_eq!(
        fields,
        vec![
            ("symbol", "BTC".to_owned()),
            ("qty", "3".to_owned()),
            ("price", "64000.5".to_owned()),
        ]
    );
}

#[test]
fn generated_codec_round_trips() {
    let trade = Trade {
        symbol: "ETH".to_owned(),
        qty: 12,
        price: 2.5,
    };
    let encoded: Vec<(String, String)> = trade
        .to_fields()
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
    let (decoded, issues) = Trade::from_fields(&encoded);
    assert_eq!(decoded, trade);
    assert!(issues.is_empty());
}

#[test]
fn generated_codec_records_issues() {
    let fields = field_map(&[("qty", "很多"), ("symbol", "BTC"), ("ignored", "1")]);
    let (decoded, issues) = Trade::from_fields(&fields);
    assert_eq!(decoded.symbol, "BTC");
    assert_eq!(decoded.qty, 0);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "qty");
    assert_eq!(issues[0].kind, "int");
}
