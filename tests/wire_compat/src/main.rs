fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use reportify_protocol::{
        Inbound, Notification, NotificationData, NotificationType, Urgency,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture as raw text, the way it arrives on the socket.
    fn load_raw(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_raw(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Drops `null` object members; the backend emits them for absent
    /// optional fields and the Rust side omits them.
    fn strip_nulls(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), strip_nulls(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(strip_nulls).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values (order-independent, nulls ignored).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            strip_nulls(&fixture),
            strip_nulls(&reserialized),
            "roundtrip mismatch for {name}:\n  backend: {fixture}\n  Rust:    {reserialized}"
        );
    }

    /// Decodes a fixture through the socket path.
    fn decode_fixture(name: &str) -> Notification {
        let inbound = Inbound::decode(&load_raw(name));
        Notification::from_inbound(&inbound)
            .unwrap_or_else(|| panic!("{name} is not a notification"))
    }

    #[test]
    fn fixture_report_created() {
        roundtrip_test::<Notification>("report_created.json");

        let n = decode_fixture("report_created.json");
        assert_eq!(n.kind, NotificationType::ReportCreated);
        assert_eq!(n.data.urgency, Some(Urgency::Alta));
        assert!(n.data.sector.is_none());
        assert!(n.message.contains("Pabellón B"));
        assert!(n.sent_at().is_some());
    }

    #[test]
    fn fixture_status_updated() {
        roundtrip_test::<Notification>("status_updated.json");

        let n = decode_fixture("status_updated.json");
        assert_eq!(n.kind, NotificationType::StatusUpdated);
        assert_eq!(
            n.data.report_id.as_deref(),
            Some("5b0c8f0e-2a57-4c55-9d0e-7f1f3a2c9e11")
        );
        assert_eq!(n.data.urgency, Some(Urgency::Media));
        assert!(n.data.status.is_none());
    }

    #[test]
    fn fixture_null_fields_are_absent() {
        roundtrip_test::<Notification>("status_updated_null_fields.json");

        let n = decode_fixture("status_updated_null_fields.json");
        assert_eq!(n.data, NotificationData::default());
        assert_eq!(n.message, "Nueva notificación");
        assert!(n.sent_at().is_none());
    }

    #[test]
    fn type_names_match_backend() {
        for name in ["report_created.json", "status_updated.json"] {
            let fixture = load_fixture(name);
            let kind = fixture["type"].as_str().unwrap();
            let parsed = NotificationType::from_name(kind).unwrap();
            assert_eq!(parsed.as_str(), kind);
        }
    }
}
