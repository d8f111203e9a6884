//! Conversion of literal option values to typed field values.

use prost_types::UninterpretedOption;
use protolink_parse::{ast::text_format, escape::CEscaped};

use crate::{options::Value, types::field_descriptor_proto::Type};

use super::OptionError;

/// A literal value, either from an uninterpreted option or from a scalar in an aggregate.
#[derive(Debug, Clone, Copy)]
pub(super) enum RawValue<'a> {
    Ident { negative: bool, name: &'a str },
    Int { negative: bool, value: u64 },
    Float(f64),
    String(&'a [u8]),
    Aggregate(&'a str),
}

/// The values of the enum type of a field.
#[derive(Debug, Clone, Copy)]
pub(super) struct EnumValues<'a> {
    pub name: &'a str,
    pub values: &'a [(String, i32)],
    pub closed: bool,
}

impl<'a> RawValue<'a> {
    pub fn from_uninterpreted(option: &'a UninterpretedOption) -> Option<Self> {
        if let Some(ident) = &option.identifier_value {
            Some(match ident.strip_prefix('-') {
                Some(name) => RawValue::Ident {
                    negative: true,
                    name,
                },
                None => RawValue::Ident {
                    negative: false,
                    name: ident,
                },
            })
        } else if let Some(value) = option.positive_int_value {
            Some(RawValue::Int {
                negative: false,
                value,
            })
        } else if let Some(value) = option.negative_int_value {
            Some(RawValue::Int {
                negative: value < 0,
                value: value.unsigned_abs(),
            })
        } else if let Some(value) = option.double_value {
            Some(RawValue::Float(value))
        } else if let Some(value) = &option.string_value {
            Some(RawValue::String(value))
        } else {
            option
                .aggregate_value
                .as_deref()
                .map(RawValue::Aggregate)
        }
    }

    pub fn from_scalar(scalar: &'a text_format::Scalar) -> Self {
        match scalar {
            text_format::Scalar::String(string) => RawValue::String(&string.value),
            text_format::Scalar::Int(int) => RawValue::Int {
                negative: int.negative,
                value: int.value,
            },
            text_format::Scalar::Float(float) => RawValue::Float(float.value),
            text_format::Scalar::Ident {
                negative, ident, ..
            } => RawValue::Ident {
                negative: *negative,
                name: &ident.value,
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RawValue::Ident { negative, name } => {
                format!("identifier '{}{}'", if *negative { "-" } else { "" }, name)
            }
            RawValue::Int { negative, value } => {
                format!("integer {}{}", if *negative { "-" } else { "" }, value)
            }
            RawValue::Float(value) => format!("float {}", value),
            RawValue::String(value) => format!("string \"{}\"", CEscaped(value)),
            RawValue::Aggregate(_) => "aggregate value".to_owned(),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            RawValue::Int {
                negative: true,
                value,
            } => Some(-i128::from(value)),
            RawValue::Int {
                negative: false,
                value,
            } => Some(i128::from(value)),
            _ => None,
        }
    }

    fn as_f64(&self, in_aggregate: bool) -> Option<f64> {
        match *self {
            RawValue::Float(value) => Some(value),
            RawValue::Int { .. } => self.as_i128().map(|value| value as f64),
            RawValue::Ident { negative, name } => {
                let value = match name {
                    "inf" => f64::INFINITY,
                    "nan" => f64::NAN,
                    _ if in_aggregate && name.eq_ignore_ascii_case("infinity") => f64::INFINITY,
                    _ if in_aggregate && name.eq_ignore_ascii_case("inf") => f64::INFINITY,
                    _ if in_aggregate && name.eq_ignore_ascii_case("nan") => f64::NAN,
                    _ => return None,
                };
                Some(if negative { -value } else { value })
            }
            _ => None,
        }
    }

    fn as_bool(&self, in_aggregate: bool) -> Option<bool> {
        match *self {
            RawValue::Ident {
                negative: false,
                name: "true",
            } => Some(true),
            RawValue::Ident {
                negative: false,
                name: "false",
            } => Some(false),
            RawValue::Ident {
                negative: false,
                name: "True" | "t",
            } if in_aggregate => Some(true),
            RawValue::Ident {
                negative: false,
                name: "False" | "f",
            } if in_aggregate => Some(false),
            RawValue::Int {
                negative: false,
                value: value @ (0 | 1),
            } if in_aggregate => Some(value == 1),
            _ => None,
        }
    }
}

/// Converts a literal to the value of a scalar or enum field.
///
/// Aggregates allow the looser text format spellings of booleans, floats and enum numbers.
pub(super) fn convert_scalar(
    name: &str,
    ty: Type,
    raw: &RawValue<'_>,
    enum_values: Option<EnumValues<'_>>,
    in_aggregate: bool,
) -> Result<Value, OptionError> {
    let invalid = |expected: &'static str| OptionError::InvalidValue {
        name: name.to_owned(),
        expected,
        actual: raw.describe(),
        span: None,
    };
    let out_of_range = |ty: &'static str| OptionError::IntegerOutOfRange {
        name: name.to_owned(),
        ty,
        value: raw
            .as_i128()
            .map(|value| value.to_string())
            .unwrap_or_default(),
        span: None,
    };

    match ty {
        Type::Bool => raw
            .as_bool(in_aggregate)
            .map(Value::Bool)
            .ok_or_else(|| invalid("'true' or 'false'")),
        Type::Double => raw
            .as_f64(in_aggregate)
            .map(Value::Double)
            .ok_or_else(|| invalid("a number")),
        Type::Float => {
            let value = raw.as_f64(in_aggregate).ok_or_else(|| invalid("a number"))?;
            let narrowed = value as f32;
            if value.is_finite() && narrowed.is_infinite() {
                Err(OptionError::FloatOutOfRange {
                    name: name.to_owned(),
                    value,
                    span: None,
                })
            } else {
                Ok(Value::Float(narrowed))
            }
        }
        Type::Int32 | Type::Sint32 | Type::Sfixed32 => {
            let value = raw.as_i128().ok_or_else(|| invalid("an integer"))?;
            let value = i32::try_from(value).map_err(|_| out_of_range(type_name(ty)))?;
            Ok(match ty {
                Type::Sint32 => Value::Sint32(value),
                Type::Sfixed32 => Value::Sfixed32(value),
                _ => Value::Int32(value),
            })
        }
        Type::Int64 | Type::Sint64 | Type::Sfixed64 => {
            let value = raw.as_i128().ok_or_else(|| invalid("an integer"))?;
            let value = i64::try_from(value).map_err(|_| out_of_range(type_name(ty)))?;
            Ok(match ty {
                Type::Sint64 => Value::Sint64(value),
                Type::Sfixed64 => Value::Sfixed64(value),
                _ => Value::Int64(value),
            })
        }
        Type::Uint32 | Type::Fixed32 => {
            let value = raw.as_i128().ok_or_else(|| invalid("an integer"))?;
            let value = u32::try_from(value).map_err(|_| out_of_range(type_name(ty)))?;
            Ok(match ty {
                Type::Fixed32 => Value::Fixed32(value),
                _ => Value::Uint32(value),
            })
        }
        Type::Uint64 | Type::Fixed64 => {
            let value = raw.as_i128().ok_or_else(|| invalid("an integer"))?;
            let value = u64::try_from(value).map_err(|_| out_of_range(type_name(ty)))?;
            Ok(match ty {
                Type::Fixed64 => Value::Fixed64(value),
                _ => Value::Uint64(value),
            })
        }
        Type::String => match raw {
            RawValue::String(bytes) => match std::str::from_utf8(bytes) {
                Ok(string) => Ok(Value::String(string.to_owned())),
                Err(_) => Err(OptionError::InvalidUtf8 {
                    name: name.to_owned(),
                    span: None,
                }),
            },
            _ => Err(invalid("a string")),
        },
        Type::Bytes => match raw {
            RawValue::String(bytes) => Ok(Value::Bytes(bytes.to_vec())),
            _ => Err(invalid("a string")),
        },
        Type::Enum => {
            let Some(enum_values) = enum_values else {
                return Err(invalid("an enum value"));
            };
            match *raw {
                RawValue::Ident {
                    negative: false,
                    name: value_name,
                } => enum_values
                    .values
                    .iter()
                    .find(|(value, _)| value == value_name)
                    .map(|&(_, number)| Value::Int32(number))
                    .ok_or_else(|| OptionError::InvalidEnumValue {
                        enum_name: enum_values.name.to_owned(),
                        value: value_name.to_owned(),
                        span: None,
                    }),
                RawValue::Int { .. } if in_aggregate => {
                    let number = raw
                        .as_i128()
                        .and_then(|value| i32::try_from(value).ok())
                        .ok_or_else(|| out_of_range("enum"))?;
                    if enum_values.closed
                        && !enum_values.values.iter().any(|&(_, n)| n == number)
                    {
                        return Err(OptionError::InvalidEnumValue {
                            enum_name: enum_values.name.to_owned(),
                            value: number.to_string(),
                            span: None,
                        });
                    }
                    Ok(Value::Int32(number))
                }
                _ => Err(invalid("an enum value")),
            }
        }
        Type::Message | Type::Group => Err(invalid("an aggregate value")),
    }
}

/// Formats a value as the `default_value` of a field descriptor.
pub(super) fn default_value_string(value: &Value) -> String {
    match value {
        Value::Float(value) => format_float(
            f64::from(*value),
            value.to_string(),
            format!("{:e}", value),
            (6, 9),
        ),
        Value::Double(value) => {
            format_float(*value, value.to_string(), format!("{:e}", value), (15, 17))
        }
        Value::Bool(value) => value.to_string(),
        Value::Int32(value) | Value::Sint32(value) | Value::Sfixed32(value) => value.to_string(),
        Value::Int64(value) | Value::Sint64(value) | Value::Sfixed64(value) => value.to_string(),
        Value::Uint32(value) | Value::Fixed32(value) => value.to_string(),
        Value::Uint64(value) | Value::Fixed64(value) => value.to_string(),
        Value::String(value) => value.clone(),
        Value::Bytes(value) => CEscaped(value).to_string(),
        Value::Message(_) | Value::Group(_) | Value::List(_) => String::new(),
    }
}

/// Formats a float like `%g` with the fewest digits that round-trip, using `precision.0`
/// significant digits if they suffice and `precision.1` otherwise.
fn format_float(
    value: f64,
    fixed: String,
    scientific: String,
    precision: (usize, usize),
) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    } else if value == f64::INFINITY {
        return "inf".to_owned();
    } else if value == f64::NEG_INFINITY {
        return "-inf".to_owned();
    }

    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return fixed;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return fixed;
    };
    let digits = mantissa.bytes().filter(u8::is_ascii_digit).count();
    let precision = if digits <= precision.0 {
        precision.0
    } else {
        precision.1
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        fixed
    }
}

pub(super) fn type_name(ty: Type) -> &'static str {
    match ty {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Group => "group",
        Type::Message => "message",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Enum => "enum",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
    }
}
