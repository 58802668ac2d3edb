//! 内部测试

mod stream_test;

use crate::record::{FieldIssue, Record, Scalar};
use std::sync::LazyLock;
use tracing::Level;
use tracing_subscriber::fmt;

static SETUP: LazyLock<()> = LazyLock::new(|| {
    fmt().with_test_writer().with_max_level(Level::DEBUG).init();
});

pub(crate) fn setup() {
    LazyLock::force(&SETUP);
}

/// 手工实现编解码的测试记录
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Order {
    pub amount: i64,
    pub note: String,
    pub rate: f32,
}

impl Record for Order {
    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("amount", Scalar::render(&self.amount)),
            ("note", Scalar::render(&self.note)),
            ("rate", Scalar::render(&self.rate)),
        ]
    }

    fn from_fields(fields: &[(String, String)]) -> (Self, Vec<FieldIssue>) {
        let mut record = Self::default();
        let mut issues = Vec::new();
        for (key, value) in fields {
            match key.as_str() {
                "amount" => match <i64 as Scalar>::parse(value) {
                    Some(v) => record.amount = v,
                    None => issues.push(FieldIssue::new("amount", i64::KIND, value)),
                },
                "note" => match <String as Scalar>::parse(value) {
                    Some(v) => record.note = v,
                    None => issues.push(FieldIssue::new("note", String::KIND, value)),
                },
                "rate" => match <f32 as Scalar>::parse(value) {
                    Some(v) => record.rate = v,
                    None => issues.push(FieldIssue::new("rate", f32::KIND, value)),
                },
                _ => {}
            }
        }
        (record, issues)
    }
}

pub(crate) fn field_map(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}
