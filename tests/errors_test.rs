#[cfg(test)]
mod error_tests {
    use camerak::config::CamerakConfig;
    use camerak::errors::CameraError;
    use std::error::Error;

    #[test]
    fn test_camera_error_display_trait() {
        let error = CameraError::CaptureError("Display test".to_string());
        assert_eq!(format!("{}", error), "Capture error: Display test");
    }

    #[test]
    fn test_camera_error_implements_error_trait() {
        let error = CameraError::MediaStoreError("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_all_error_variants() {
        let errors = vec![
            (CameraError::InitializationError("a".into()), "Camera initialization error"),
            (CameraError::PermissionDenied("a".into()), "Permission denied"),
            (CameraError::CaptureError("a".into()), "Capture error"),
            (CameraError::ConfigurationError("a".into()), "Session configuration error"),
            (CameraError::ProcessingError("a".into()), "Image processing error"),
            (CameraError::MediaStoreError("a".into()), "Media store error"),
            (CameraError::RecordingError("a".into()), "Recording error"),
            (CameraError::PreferencesError("a".into()), "Preferences error"),
            (CameraError::InvalidState("a".into()), "Invalid session state"),
            (CameraError::IoError("a".into()), "IO error"),
        ];

        for (error, prefix) in errors {
            assert!(error.to_string().starts_with(prefix), "{} should start with {}", error, prefix);
        }
    }

    #[test]
    fn test_io_permission_error_maps_to_permission_denied() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(CameraError::from(io), CameraError::PermissionDenied(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(CameraError::from(io), CameraError::IoError(_)));
    }

    #[test]
    fn test_parse_errors() {
        let err = "RATIO_3_2".parse::<camerak::AspectRatio>().unwrap_err();
        assert!(err.to_string().contains("RATIO_3_2"));
        assert!("SLOWMO".parse::<camerak::CaptureMode>().is_err());
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camerak.toml");
        std::fs::write(&path, "[camera\nbroken").unwrap();

        let err = CamerakConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, CameraError::InitializationError(_)));
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
