use axum::body::Bytes;
use lab_dashboard::storage::{MockStorageService, S3StorageClient, StorageService, sanitize_key};

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "reports/u1/m1/laporan.pdf";
        let bytes = Bytes::from_static(b"%PDF-1.4");

        let location = mock
            .put_object(key, bytes.clone(), "application/pdf")
            .await
            .unwrap();

        assert!(location.ends_with(key));
        assert_eq!(
            mock.object(key),
            Some(("application/pdf".to_string(), bytes))
        );
        assert_eq!(mock.object_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock
            .put_object("reports/x.pdf", Bytes::from_static(b"x"), "application/pdf")
            .await;
        assert!(result.is_err());
        assert_eq!(mock.object_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let location = mock
            .put_object("../../etc/passwd", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        assert!(!location.contains(".."));
        assert!(mock.object("etc/passwd").is_some());
    }
}

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_sanitize_key_drops_navigation_and_empty_segments() {
        assert_eq!(sanitize_key("reports//a/./b/../c.pdf"), "reports/a/b/c.pdf");
        assert_eq!(sanitize_key("/leading/slash.pdf"), "leading/slash.pdf");
        assert_eq!(sanitize_key("plain.pdf"), "plain.pdf");
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_object_location_is_path_style() {
        let client = S3StorageClient::new(
            "http://localhost:9000/",
            "us-east-1",
            "testkey",
            "testsecret",
            "laporan",
        )
        .await;

        assert_eq!(
            client.object_location("reports/u/m/a.pdf"),
            "http://localhost:9000/laporan/reports/u/m/a.pdf"
        );
    }
}
