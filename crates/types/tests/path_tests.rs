use types::{AttributePath, ConfigurationRequest, PathError};

#[test]
fn path_encodes_as_slash_separated_ids() {
    let path = AttributePath::new(1, 1030, 3);
    assert_eq!(path.to_string(), "1/1030/3");
}

#[test]
fn path_decodes_wire_form() {
    let path: AttributePath = "0/6/0".parse().expect("parse");
    assert_eq!(path, AttributePath::new(0, 6, 0));

    let path: AttributePath = "1/1030/3".parse().expect("parse");
    assert_eq!(path.endpoint_id, 1);
    assert_eq!(path.cluster_id, 1030);
    assert_eq!(path.attribute_id, 3);
}

#[test]
fn path_rejects_malformed_input() {
    assert!(matches!(
        "1/1030".parse::<AttributePath>(),
        Err(PathError::SegmentCount(_))
    ));
    assert!(matches!(
        "1/1030/3/4".parse::<AttributePath>(),
        Err(PathError::SegmentCount(_))
    ));
    assert!(matches!(
        "1//3".parse::<AttributePath>(),
        Err(PathError::InvalidSegment { segment: "cluster", .. })
    ));
    assert!(matches!(
        "-1/1030/3".parse::<AttributePath>(),
        Err(PathError::InvalidSegment { segment: "endpoint", .. })
    ));
    assert!(matches!(
        "+1/1030/3".parse::<AttributePath>(),
        Err(PathError::InvalidSegment { segment: "endpoint", .. })
    ));
    assert!(matches!(
        "70000/1030/3".parse::<AttributePath>(),
        Err(PathError::InvalidSegment { segment: "endpoint", .. })
    ));
    assert!(matches!(
        "1/1030/x".parse::<AttributePath>(),
        Err(PathError::InvalidSegment { segment: "attribute", .. })
    ));
}

#[test]
fn path_serializes_as_string() {
    let path = AttributePath::new(1, 1030, 3);
    let json = serde_json::to_string(&path).expect("serialize");
    assert_eq!(json, "\"1/1030/3\"");

    let back: AttributePath = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, path);
    assert!(serde_json::from_str::<AttributePath>("\"1/2\"").is_err());
}

#[test]
fn request_keeps_its_fields() {
    let request = ConfigurationRequest::new(
        3,
        AttributePath::new(1, 1030, 3),
        30,
        "ws://localhost:5580/ws",
    );
    assert_eq!(request.node_id, 3);
    assert_eq!(request.path.to_string(), "1/1030/3");
    assert_eq!(request.desired_value, 30);
    assert_eq!(request.server_url, "ws://localhost:5580/ws");
}
