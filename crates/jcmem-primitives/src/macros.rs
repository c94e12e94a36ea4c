#[macro_export]
macro_rules! element_kind_registry_entries {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $(
                @args $($args)+;
            )?
            @entries
            (
                Boolean,
                code = 1,
                width = 1,
                is_primitive = true,
                supports_generic_ops = false,
                supports_transient = true
            ),
            (
                Byte,
                code = 2,
                width = 1,
                is_primitive = true,
                supports_generic_ops = true,
                supports_transient = true
            ),
            (
                Short,
                code = 3,
                width = 2,
                is_primitive = true,
                supports_generic_ops = true,
                supports_transient = true
            ),
            (
                Int,
                code = 4,
                width = 4,
                is_primitive = true,
                supports_generic_ops = true,
                supports_transient = true
            ),
            (
                Object,
                code = 5,
                width = 4,
                is_primitive = false,
                supports_generic_ops = false,
                supports_transient = true
            ),
        }
    };
}

macro_rules! element_kind_registry {
    ($macro:ident) => {
        $crate::element_kind_registry_entries!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::element_kind_registry_entries!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $kind:expr; @entries $( ($element:ident, code = $code:expr, width = $width:expr, is_primitive = $is_primitive:expr, supports_generic_ops = $supports_generic_ops:expr, supports_transient = $supports_transient:expr) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::ElementKind::$element => $crate::ElementMetadata {
                    code: $code,
                    width: $width,
                    is_primitive: $is_primitive,
                    supports_generic_ops: $supports_generic_ops,
                    supports_transient: $supports_transient,
                },
            )*
        }
    };
}

macro_rules! kind_from_code_registry {
    ( @args $code:expr; @entries $( ($element:ident, code = $kind_code:literal, width = $width:expr, is_primitive = $is_primitive:expr, supports_generic_ops = $supports_generic_ops:expr, supports_transient = $supports_transient:expr) ),* $(,)? ) => {
        match $code {
            $(
                $kind_code => Some($crate::ElementKind::$element),
            )*
            _ => None,
        }
    };
}

macro_rules! all_kinds_from_registry {
    ( @entries $( ($element:ident, code = $code:expr, width = $width:expr, is_primitive = $is_primitive:expr, supports_generic_ops = $supports_generic_ops:expr, supports_transient = $supports_transient:expr) ),* $(,)? ) => {
        [ $( $crate::ElementKind::$element ),* ]
    };
}
