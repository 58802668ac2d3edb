//! # **rill** 记录编解码
//!
//! 类型化记录与代理的平面字段映射之间的转换。编解码不做任何
//! I/O，给定输入结果确定。解析失败的字段保持默认值并记录诊断，
//! 这是有意保留的回退行为，诊断使其可被调用方察觉。

use std::fmt;

/// 平面记录字段支持的标量特征
///
/// 记录的每个持久化字段都必须实现该特征。嵌套结构不受支持，
/// 缺少实现会在编译期报错。
pub trait Scalar: Default + Sized {
    /// 标量类型名称，用于诊断信息
    const KIND: &'static str;

    /// 从字符串解析，失败返回 None
    fn parse(s: &str) -> Option<Self>;

    /// 渲染为字符串
    fn render(&self) -> String;
}

impl Scalar for String {
    const KIND: &'static str = "string";

    #[inline]
    fn parse(s: &str) -> Option<Self> {
        Some(s.to_owned())
    }

    #[inline]
    fn render(&self) -> String {
        self.clone()
    }
}

macro_rules! scalar_impl {
    ($kind:literal, $($t:ty),+) => {
        $(
            impl Scalar for $t {
                const KIND: &'static str = $kind;

                #[inline]
                fn parse(s: &str) -> Option<Self> {
                    s.parse().ok()
                }

                #[inline]
                fn render(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

scalar_impl!("int", i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
scalar_impl!("float", f32, f64);

/// 解码诊断
///
/// 字段映射中的某个值无法解析为目标字段的标量类型。相应字段
/// 保持默认值，消息不会被丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    /// 目标字段名
    pub field: &'static str,
    /// 目标字段的标量类型名称
    pub kind: &'static str,
    /// 无法解析的原始值
    pub value: String,
}

impl FieldIssue {
    /// 构造函数
    pub fn new(field: &'static str, kind: &'static str, value: &str) -> Self {
        Self {
            field,
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "字段{}的值'{}'无法解析为{}",
            self.field, self.value, self.kind
        )
    }
}

/// 平面记录特征
///
/// 通常由 #[record] 宏生成实现，也可以手工实现。
pub trait Record: Default + Send + 'static {
    /// 编码为字段映射，每个字段一个条目，键为字段名
    fn to_fields(&self) -> Vec<(&'static str, String)>;

    /// 从字段映射解码
    ///
    /// 未知键忽略；映射中缺失的字段保持默认值；无法解析的值
    /// 保持默认值并记录一条诊断。
    fn from_fields(fields: &[(String, String)]) -> (Self, Vec<FieldIssue>);
}

/// 流消息，绑定记录类型 T
///
/// id 由代理分配，在流内唯一且单调。构造后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    /// 代理分配的条目 Id
    pub id: String,
    /// 解码后的记录
    pub data: T,
}
