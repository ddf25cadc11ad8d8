use std::{cell::RefCell, collections::HashMap};

use hostex_common::error::{HostexError, Result};
use tracing::debug;
use wmi::{COMLibrary, Variant, WMIConnection};

use super::{FieldValue, NativeSource, QueryRequest, Row};

thread_local! {
    // COM objects are bound to the thread that created them.
    static CONNECTION: RefCell<Option<WMIConnection>> = const { RefCell::new(None) };
}

/// Performance counters read live from WMI (`ROOT\CIMV2`).
///
/// Queries run on blocking-pool threads; each thread opens its own
/// connection on first use and keeps it.
#[derive(Debug, Default, Clone, Copy)]
pub struct WmiSource;

impl WmiSource {
    pub fn new() -> Self {
        Self
    }
}

impl NativeSource for WmiSource {
    fn name(&self) -> &str {
        "wmi"
    }

    fn supports(&self, class: &str) -> bool {
        let probe = format!("SELECT * FROM meta_class WHERE __CLASS = '{class}'");
        with_connection(|connection| {
            connection
                .raw_query::<HashMap<String, Variant>>(&probe)
                .map_err(|err| HostexError::Query(format!("{class}: {err}")))
        })
        .is_ok_and(|classes| !classes.is_empty())
    }

    fn query(&self, request: &QueryRequest) -> Result<Vec<Row>> {
        let wql = request.wql();
        debug!(query = %wql, "running WMI query");

        let rows = with_connection(|connection| {
            connection
                .raw_query::<HashMap<String, Variant>>(&wql)
                .map_err(|err| HostexError::Query(format!("{}: {err}", request.class)))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(field, value)| (field, field_value(value)))
                    .collect()
            })
            .collect())
    }
}

fn with_connection<T>(run: impl FnOnce(&WMIConnection) -> Result<T>) -> Result<T> {
    CONNECTION.with(|slot| {
        let mut slot = slot.borrow_mut();
        let connection = match slot.take() {
            Some(connection) => connection,
            None => connect()?,
        };
        let result = run(&connection);
        *slot = Some(connection);
        result
    })
}

fn connect() -> Result<WMIConnection> {
    // Process-wide COM security can only be set once; later threads skip it.
    let com = COMLibrary::new()
        .or_else(|_| COMLibrary::without_security())
        .map_err(|err| HostexError::Query(format!("COM initialization failed: {err}")))?;
    WMIConnection::new(com)
        .map_err(|err| HostexError::Query(format!("WMI connection failed: {err}")))
}

fn field_value(value: Variant) -> FieldValue {
    match value {
        // uint64 counters are delivered as strings.
        Variant::String(text) => FieldValue::Text(text),
        Variant::I1(value) => FieldValue::Signed(value.into()),
        Variant::I2(value) => FieldValue::Signed(value.into()),
        Variant::I4(value) => FieldValue::Signed(value.into()),
        Variant::I8(value) => FieldValue::Signed(value),
        Variant::UI1(value) => FieldValue::Unsigned(value.into()),
        Variant::UI2(value) => FieldValue::Unsigned(value.into()),
        Variant::UI4(value) => FieldValue::Unsigned(value.into()),
        Variant::UI8(value) => FieldValue::Unsigned(value),
        Variant::R4(value) => FieldValue::Float(value.into()),
        Variant::R8(value) => FieldValue::Float(value),
        Variant::Bool(value) => FieldValue::Unsigned(value.into()),
        _ => FieldValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_onto_field_values() {
        assert_eq!(
            field_value(Variant::String("18446744073709551615".to_string())),
            FieldValue::Text("18446744073709551615".to_string())
        );
        assert_eq!(field_value(Variant::UI4(7)), FieldValue::Unsigned(7));
        assert_eq!(field_value(Variant::I2(-3)), FieldValue::Signed(-3));
        assert_eq!(field_value(Variant::R8(0.5)), FieldValue::Float(0.5));
        assert_eq!(field_value(Variant::Bool(true)), FieldValue::Unsigned(1));
        assert_eq!(field_value(Variant::Null), FieldValue::Null);
    }

    #[test]
    fn reads_a_core_class() {
        let source = WmiSource::new();
        assert!(source.supports("Win32_OperatingSystem"));
        assert!(!source.supports("Win32_NoSuchClass"));

        let rows = source
            .query(&QueryRequest {
                class: "Win32_OperatingSystem".to_string(),
                fields: vec!["Caption".to_string()],
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].get("Caption"), Some(FieldValue::Text(_))));
    }
}
