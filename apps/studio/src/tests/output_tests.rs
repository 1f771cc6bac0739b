use super::*;

#[test]
fn maps_common_image_mime_types() {
    assert_eq!(extension_for_mime("image/jpeg"), "jpg");
    assert_eq!(extension_for_mime("image/png"), "png");
    assert_eq!(extension_for_mime("application/x-unknown-thing"), "png");
}

#[tokio::test]
async fn writes_decoded_bytes_with_matching_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("renders");

    let path = write_image(&out, "1700000000000-1-0", "data:image/jpeg;base64,aGVsbG8=")
        .await
        .expect("write");

    assert_eq!(path, out.join("1700000000000-1-0.jpg"));
    assert_eq!(std::fs::read(&path).expect("read back"), b"hello");
}

#[tokio::test]
async fn remote_urls_are_not_written() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = write_image(dir.path(), "remote", "https://example.com/cat.png")
        .await
        .expect_err("not inline");
    assert!(err.to_string().contains("not an inline data uri"));
}
