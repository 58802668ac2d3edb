//! # **rill** 宏
//!
//!

use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, parse_macro_input};

/// 规范平面记录结构体定义
///
/// 1. 添加 #[derive(Debug, Default, Clone, PartialEq)]。
/// 2. 实现 Record 特征：字段按声明顺序编码为字段映射，
///    解码时按字段名精确匹配，未知键忽略，缺失字段保持默认值，
///    解析失败的字段保持默认值并记录诊断。
///
/// 字段类型必须实现 Scalar 特征，否则编译失败。
///
/// # Panics
///
/// 仅支持具名字段的结构体。
///
/// 禁止与 #[derive] 同时使用。
#[proc_macro_attribute]
pub fn record(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    let struct_name = &input.ident;

    if input
        .attrs
        .iter()
        .any(|attr| attr.path().is_ident("derive"))
    {
        panic!("#[record]与#[derive]禁止同时使用");
    }

    let fields = match &input.fields {
        Fields::Named(fields) => &fields.named,
        _ => panic!("#[record]仅支持具名字段的结构体"),
    };

    let names: Vec<_> = fields.iter().map(|f| f.ident.as_ref().unwrap()).collect();
    let types: Vec<_> = fields.iter().map(|f| &f.ty).collect();

    let expanded = quote! {
        #[derive(Debug, Default, Clone, PartialEq)]
        #input

        impl rill::record::Record for #struct_name {
            fn to_fields(&self) -> Vec<(&'static str, String)> {
                vec![
                    #((stringify!(#names), rill::record::Scalar::render(&self.#names)),)*
                ]
            }

            fn from_fields(fields: &[(String, String)]) -> (Self, Vec<rill::record::FieldIssue>) {
                let mut record = <Self as Default>::default();
                let mut issues = Vec::new();
                for (key, value) in fields {
                    #(
                        if key.as_str() == stringify!(#names) {
                            match <#types as rill::record::Scalar>::parse(value.as_str()) {
                                Some(v) => record.#names = v,
                                None => issues.push(rill::record::FieldIssue::new(
                                    stringify!(#names),
                                    <#types as rill::record::Scalar>::KIND,
                                    value.as_str(),
                                )),
                            }
                            continue;
                        }
                    )*
                }
                (record, issues)
            }
        }
    };

    TokenStream::from(expanded)
}
