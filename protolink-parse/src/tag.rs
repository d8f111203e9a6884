//! Field numbers of `google/protobuf/descriptor.proto`, used to build source code info paths.
#![allow(missing_docs)]

pub const UNINTERPRETED_OPTION: i32 = 999;

pub mod file {
    pub const NAME: i32 = 1;
    pub const PACKAGE: i32 = 2;
    pub const DEPENDENCY: i32 = 3;
    pub const PUBLIC_DEPENDENCY: i32 = 10;
    pub const WEAK_DEPENDENCY: i32 = 11;
    pub const MESSAGE_TYPE: i32 = 4;
    pub const ENUM_TYPE: i32 = 5;
    pub const SERVICE: i32 = 6;
    pub const EXTENSION: i32 = 7;
    pub const OPTIONS: i32 = 8;
    pub const SOURCE_CODE_INFO: i32 = 9;
    pub const SYNTAX: i32 = 12;
}

pub mod message {
    pub const NAME: i32 = 1;
    pub const FIELD: i32 = 2;
    pub const EXTENSION: i32 = 6;
    pub const NESTED_TYPE: i32 = 3;
    pub const ENUM_TYPE: i32 = 4;
    pub const EXTENSION_RANGE: i32 = 5;
    pub const OPTIONS: i32 = 7;
    pub const ONEOF_DECL: i32 = 8;
    pub const RESERVED_RANGE: i32 = 9;
    pub const RESERVED_NAME: i32 = 10;

    pub mod extension_range {
        pub const START: i32 = 1;
        pub const END: i32 = 2;
        pub const OPTIONS: i32 = 3;
    }

    pub mod reserved_range {
        pub const START: i32 = 1;
        pub const END: i32 = 2;
    }
}

pub mod field {
    pub const NAME: i32 = 1;
    pub const EXTENDEE: i32 = 2;
    pub const NUMBER: i32 = 3;
    pub const LABEL: i32 = 4;
    pub const TYPE: i32 = 5;
    pub const TYPE_NAME: i32 = 6;
    pub const DEFAULT_VALUE: i32 = 7;
    pub const OPTIONS: i32 = 8;
    pub const ONEOF_INDEX: i32 = 9;
    pub const JSON_NAME: i32 = 10;
    pub const PROTO3_OPTIONAL: i32 = 17;
}

pub mod oneof {
    pub const NAME: i32 = 1;
    pub const OPTIONS: i32 = 2;
}

pub mod enum_ {
    pub const NAME: i32 = 1;
    pub const VALUE: i32 = 2;
    pub const OPTIONS: i32 = 3;
    pub const RESERVED_RANGE: i32 = 4;
    pub const RESERVED_NAME: i32 = 5;

    pub mod reserved_range {
        pub const START: i32 = 1;
        pub const END: i32 = 2;
    }
}

pub mod enum_value {
    pub const NAME: i32 = 1;
    pub const NUMBER: i32 = 2;
    pub const OPTIONS: i32 = 3;
}

pub mod service {
    pub const NAME: i32 = 1;
    pub const METHOD: i32 = 2;
    pub const OPTIONS: i32 = 3;
}

pub mod method {
    pub const NAME: i32 = 1;
    pub const INPUT_TYPE: i32 = 2;
    pub const OUTPUT_TYPE: i32 = 3;
    pub const OPTIONS: i32 = 4;
    pub const CLIENT_STREAMING: i32 = 5;
    pub const SERVER_STREAMING: i32 = 6;
}

pub mod uninterpreted_option {
    pub const NAME: i32 = 2;
    pub const IDENTIFIER_VALUE: i32 = 3;
    pub const POSITIVE_INT_VALUE: i32 = 4;
    pub const NEGATIVE_INT_VALUE: i32 = 5;
    pub const DOUBLE_VALUE: i32 = 6;
    pub const STRING_VALUE: i32 = 7;
    pub const AGGREGATE_VALUE: i32 = 8;

    pub mod name_part {
        pub const NAME_PART: i32 = 1;
        pub const IS_EXTENSION: i32 = 2;
    }
}
