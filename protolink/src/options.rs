use std::collections::btree_map::{self, BTreeMap};
use std::mem;

use bytes::{Buf, BufMut};
use prost::encoding::{self, DecodeContext, WireType};
use prost::{DecodeError, Message};
use prost_types::UninterpretedOption;
use protolink_parse::tag;

/// The options of a single descriptor, stored as a dynamic message keyed by field number.
///
/// Fields which were set by interpreting an option carry a precise type. Fields decoded from
/// bytes, such as extension options of a pre-built descriptor set, are kept in a form which
/// re-encodes to the same wire representation.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct OptionSet {
    fields: BTreeMap<u32, Value>,
    uninterpreted_options: Vec<UninterpretedOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Float(f32),
    Double(f64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Fixed32(u32),
    Fixed64(u64),
    Sint32(i32),
    Sint64(i64),
    Sfixed32(i32),
    Sfixed64(i64),
    String(String),
    Bytes(Vec<u8>),
    Message(OptionSet),
    Group(OptionSet),
    /// The values of a repeated field, encoded unpacked.
    List(Vec<Value>),
}

impl OptionSet {
    pub fn new() -> Self {
        Default::default()
    }

    #[cfg(test)]
    pub fn uninterpreted(uninterpreted_options: Vec<UninterpretedOption>) -> Self {
        OptionSet {
            fields: BTreeMap::new(),
            uninterpreted_options,
        }
    }

    #[cfg(test)]
    pub fn uninterpreted_options(&self) -> &[UninterpretedOption] {
        &self.uninterpreted_options
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.uninterpreted_options.is_empty()
    }

    pub fn take_uninterpreted(&mut self) -> Vec<UninterpretedOption> {
        mem::take(&mut self.uninterpreted_options)
    }

    pub fn set_uninterpreted(&mut self, options: Vec<UninterpretedOption>) {
        self.uninterpreted_options = options;
    }

    pub fn get(&self, number: i32) -> Option<&Value> {
        self.fields.get(&(number as u32))
    }

    pub fn contains(&self, number: i32) -> bool {
        self.fields.contains_key(&(number as u32))
    }

    /// Gets a boolean field, whether it was interpreted or decoded from bytes.
    pub fn get_bool(&self, number: i32) -> Option<bool> {
        match self.get(number)? {
            Value::Bool(value) => Some(*value),
            Value::Uint64(value) => Some(*value != 0),
            _ => None,
        }
    }

    /// Gets the message stored in a singular message or group field, inserting an empty message
    /// if it is not yet set.
    ///
    /// Returns `None` if the field holds a value of any other kind. A message decoded from bytes
    /// is parsed in place.
    pub fn get_message_mut(&mut self, number: i32, is_group: bool) -> Option<&mut OptionSet> {
        let value = self.fields.entry(number as u32).or_insert_with(|| {
            if is_group {
                Value::Group(OptionSet::new())
            } else {
                Value::Message(OptionSet::new())
            }
        });
        if let Value::Bytes(bytes) = value {
            *value = Value::Message(OptionSet::decode(bytes.as_slice()).ok()?);
        }
        match value {
            Value::Message(message) | Value::Group(message) => Some(message),
            _ => None,
        }
    }

    /// Sets a singular field, returning `Err` if it already has a value.
    pub fn set(&mut self, number: i32, value: Value) -> Result<(), ()> {
        match self.fields.entry(number as u32) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
            btree_map::Entry::Occupied(_) => Err(()),
        }
    }

    /// Appends a value to a repeated field, returning the index of the new element.
    pub fn push(&mut self, number: i32, value: Value) -> usize {
        match self.fields.entry(number as u32) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Value::List(vec![value]));
                0
            }
            btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::List(list) => {
                    list.push(value);
                    list.len() - 1
                }
                existing => {
                    let first = mem::replace(existing, Value::List(Vec::new()));
                    *existing = Value::List(vec![first, value]);
                    1
                }
            },
        }
    }
}

impl Value {
    fn encode<B: BufMut>(&self, tag: u32, buf: &mut B) {
        match self {
            Value::Float(value) => encoding::float::encode(tag, value, buf),
            Value::Double(value) => encoding::double::encode(tag, value, buf),
            Value::Bool(value) => encoding::bool::encode(tag, value, buf),
            Value::Int32(value) => encoding::int32::encode(tag, value, buf),
            Value::Int64(value) => encoding::int64::encode(tag, value, buf),
            Value::Uint32(value) => encoding::uint32::encode(tag, value, buf),
            Value::Uint64(value) => encoding::uint64::encode(tag, value, buf),
            Value::Fixed32(value) => encoding::fixed32::encode(tag, value, buf),
            Value::Fixed64(value) => encoding::fixed64::encode(tag, value, buf),
            Value::Sint32(value) => encoding::sint32::encode(tag, value, buf),
            Value::Sint64(value) => encoding::sint64::encode(tag, value, buf),
            Value::Sfixed32(value) => encoding::sfixed32::encode(tag, value, buf),
            Value::Sfixed64(value) => encoding::sfixed64::encode(tag, value, buf),
            Value::String(value) => encoding::string::encode(tag, value, buf),
            Value::Bytes(value) => encoding::bytes::encode(tag, value, buf),
            Value::Message(value) => encoding::message::encode(tag, value, buf),
            Value::Group(value) => encoding::group::encode(tag, value, buf),
            Value::List(values) => {
                for value in values {
                    value.encode(tag, buf);
                }
            }
        }
    }

    fn encoded_len(&self, tag: u32) -> usize {
        match self {
            Value::Float(value) => encoding::float::encoded_len(tag, value),
            Value::Double(value) => encoding::double::encoded_len(tag, value),
            Value::Bool(value) => encoding::bool::encoded_len(tag, value),
            Value::Int32(value) => encoding::int32::encoded_len(tag, value),
            Value::Int64(value) => encoding::int64::encoded_len(tag, value),
            Value::Uint32(value) => encoding::uint32::encoded_len(tag, value),
            Value::Uint64(value) => encoding::uint64::encoded_len(tag, value),
            Value::Fixed32(value) => encoding::fixed32::encoded_len(tag, value),
            Value::Fixed64(value) => encoding::fixed64::encoded_len(tag, value),
            Value::Sint32(value) => encoding::sint32::encoded_len(tag, value),
            Value::Sint64(value) => encoding::sint64::encoded_len(tag, value),
            Value::Sfixed32(value) => encoding::sfixed32::encoded_len(tag, value),
            Value::Sfixed64(value) => encoding::sfixed64::encoded_len(tag, value),
            Value::String(value) => encoding::string::encoded_len(tag, value),
            Value::Bytes(value) => encoding::bytes::encoded_len(tag, value),
            Value::Message(value) => encoding::message::encoded_len(tag, value),
            Value::Group(value) => encoding::group::encoded_len(tag, value),
            Value::List(values) => values.iter().map(|value| value.encoded_len(tag)).sum(),
        }
    }
}

impl Message for OptionSet {
    fn encode_raw<B>(&self, buf: &mut B)
    where
        B: BufMut,
        Self: Sized,
    {
        let uninterpreted_tag = tag::UNINTERPRETED_OPTION as u32;
        let mut uninterpreted_written = false;
        for (&tag, value) in &self.fields {
            if !uninterpreted_written && tag > uninterpreted_tag {
                encoding::message::encode_repeated(
                    uninterpreted_tag,
                    &self.uninterpreted_options,
                    buf,
                );
                uninterpreted_written = true;
            }
            value.encode(tag, buf);
        }
        if !uninterpreted_written {
            encoding::message::encode_repeated(uninterpreted_tag, &self.uninterpreted_options, buf);
        }
    }

    fn merge_field<B>(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut B,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        B: Buf,
        Self: Sized,
    {
        if tag == tag::UNINTERPRETED_OPTION as u32 {
            return encoding::message::merge_repeated(
                wire_type,
                &mut self.uninterpreted_options,
                buf,
                ctx,
            );
        }

        let value = match wire_type {
            WireType::Varint => {
                let mut value = 0;
                encoding::uint64::merge(wire_type, &mut value, buf, ctx)?;
                Value::Uint64(value)
            }
            WireType::SixtyFourBit => {
                let mut value = 0;
                encoding::fixed64::merge(wire_type, &mut value, buf, ctx)?;
                Value::Fixed64(value)
            }
            WireType::ThirtyTwoBit => {
                let mut value = 0;
                encoding::fixed32::merge(wire_type, &mut value, buf, ctx)?;
                Value::Fixed32(value)
            }
            WireType::LengthDelimited => {
                let mut value = Vec::new();
                encoding::bytes::merge(wire_type, &mut value, buf, ctx)?;
                Value::Bytes(value)
            }
            WireType::StartGroup => {
                let mut value = OptionSet::new();
                encoding::group::merge(tag, wire_type, &mut value, buf, ctx)?;
                Value::Group(value)
            }
            WireType::EndGroup => return Err(DecodeError::new("unexpected end group tag")),
        };

        if self.contains(tag as i32) {
            self.push(tag as i32, value);
        } else {
            self.fields.insert(tag, value);
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        encoding::message::encoded_len_repeated(
            tag::UNINTERPRETED_OPTION as u32,
            &self.uninterpreted_options,
        ) + self
            .fields
            .iter()
            .map(|(&tag, value)| value.encoded_len(tag))
            .sum::<usize>()
    }

    fn clear(&mut self) {
        self.fields.clear();
        self.uninterpreted_options.clear();
    }
}

#[cfg(test)]
mod tests {
    use prost_types::{uninterpreted_option::NamePart, FieldOptions};

    use super::*;

    #[test]
    fn encodes_uninterpreted_options_in_field_order() {
        let mut options = OptionSet::uninterpreted(vec![UninterpretedOption {
            name: vec![NamePart {
                name_part: "foo".to_owned(),
                is_extension: true,
            }],
            identifier_value: Some("BAR".to_owned()),
            ..Default::default()
        }]);
        options.set(3, Value::Bool(true)).unwrap();
        options.set(50000, Value::Int32(-5)).unwrap();

        let decoded = FieldOptions::decode(options.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.deprecated, Some(true));
        assert_eq!(decoded.uninterpreted_option.len(), 1);

        let roundtripped = OptionSet::decode(options.encode_to_vec().as_slice()).unwrap();
        assert_eq!(roundtripped.encode_to_vec(), options.encode_to_vec());
        assert_eq!(roundtripped.get_bool(3), Some(true));
    }

    #[test]
    fn push_converts_decoded_field_to_list() {
        let mut options = OptionSet::new();
        options.set(7, Value::Uint64(1)).unwrap();
        assert_eq!(options.push(7, Value::Uint64(2)), 1);
        assert_eq!(options.push(7, Value::Uint64(3)), 2);
        assert_eq!(
            options.get(7),
            Some(&Value::List(vec![
                Value::Uint64(1),
                Value::Uint64(2),
                Value::Uint64(3)
            ]))
        );
    }

    #[test]
    fn set_twice_fails() {
        let mut options = OptionSet::new();
        assert!(options.set(1, Value::String("a".to_owned())).is_ok());
        assert!(options.set(1, Value::String("b".to_owned())).is_err());
    }

    #[test]
    fn nested_message_is_created_once() {
        let mut options = OptionSet::new();
        options
            .get_message_mut(1000, false)
            .unwrap()
            .set(1, Value::Int32(1))
            .unwrap();
        options
            .get_message_mut(1000, false)
            .unwrap()
            .set(2, Value::Int32(2))
            .unwrap();

        options.set(1001, Value::Int32(3)).unwrap();
        assert!(options.get_message_mut(1001, false).is_none());

        let Some(Value::Message(nested)) = options.get(1000) else {
            panic!("expected message");
        };
        assert!(nested.contains(1) && nested.contains(2));
    }
}
