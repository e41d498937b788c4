fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use packdesk_protocol::{
        GetPackageResponse, PackageRecord, UpdatePackageResponse, UploadProgress, UploadStatus,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Maps every number to `f64` so that `12000` and `12000.0` compare equal.
    ///
    /// The backend stores prices as JavaScript numbers, which serialize
    /// without a fraction; `f64` fields serialize with one.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  API:  {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_package_record() {
        let record: PackageRecord = roundtrip_test("package_record.json");
        assert_eq!(record.package_price, 18500.0);
        assert!(record.package_offer);
        assert_eq!(record.package_images.len(), 2);
    }

    #[test]
    fn fixture_get_package_response() {
        let resp: GetPackageResponse = roundtrip_test("get_package_response.json");
        assert!(resp.success);
        let data = resp.package_data.expect("packageData");
        assert_eq!(data.package_destination, "Alleppey, India");
        assert!(data.package_images.is_empty());
    }

    #[test]
    fn fixture_get_package_not_found() {
        let resp: GetPackageResponse = roundtrip_test("get_package_not_found.json");
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("Package not found!"));
    }

    #[test]
    fn fixture_update_package_response() {
        let resp: UpdatePackageResponse = roundtrip_test("update_package_response.json");
        assert!(resp.success);
    }

    #[test]
    fn fixture_upload_progress() {
        let progress: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(progress.status, UploadStatus::InProgress);
        assert_eq!(progress.percentage(), 50);
    }

    /// Stored documents carry database bookkeeping the record does not model.
    #[test]
    fn stored_document_extra_fields_are_ignored() {
        let fixture = load_fixture("get_package_stored.json");
        let resp: GetPackageResponse = serde_json::from_value(fixture).unwrap();
        let data = resp.package_data.unwrap();
        assert_eq!(data.package_images, vec!["https://cdn.example/houseboat.jpg"]);

        // Re-sending the record drops them.
        let sent = serde_json::to_value(&data).unwrap();
        assert!(sent.get("_id").is_none());
        assert!(sent.get("packageRating").is_none());
    }
}
