use model::Order;
use rill::record::Record;

mod model {
    use rill::macros::record;

    #[record]
    pub struct Order {
        pub amount: i64,
        pub note: String,
        pub rate: f32,
    }
}

fn main() {
    let order = Order {
        amount: 42,
        note: "演示".to_string(),
        rate: 1.5,
    };
    let fields = order.to_fields();
    println!("{:#?}", fields);

    let wire: Vec<(String, String)> = fields
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
    let (decoded, issues) = Order::from_fields(&wire);
    println!("{:#?}", decoded);
    println!("诊断数：{}", issues.len());

    // 无法解析的值保持默认并记录诊断
    let broken = vec![("amount".to_string(), "abc".to_string())];
    let (decoded, issues) = Order::from_fields(&broken);
    println!("{:#?}", decoded);
    println!("{:#?}", issues);
}
