// Unit tests for the Graph API wire format.
//
// Tests serde deserialization, field defaulting, cursor extraction, and
// the fail-closed attachment URL path — all without network access.

use magpie::graph::comments::{Comment, CommentsPage, PostContent, RawPost};

#[test]
fn deserialize_full_comment_page() {
    let json = r#"{
        "data": [{
            "id": "123_456",
            "created_time": "2026-08-01T10:00:00+0000",
            "message": "aqui mi ticket",
            "from": {"id": "789", "name": "Ana Torres"},
            "attachment": {
                "type": "photo",
                "media": {"image": {"src": "https://scontent.example/receipt.jpg", "height": 720, "width": 540}}
            }
        }],
        "paging": {"cursors": {"before": "AAA", "after": "BBB"}}
    }"#;

    let page: CommentsPage = serde_json::from_str(json).unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.next_cursor(), Some("BBB".to_string()));

    let comment = Comment::from(page.data.into_iter().next().unwrap());
    assert_eq!(comment.id, "123_456");
    assert_eq!(comment.author_id, "789");
    assert_eq!(comment.author_name, "Ana Torres");
    assert_eq!(comment.message, "aqui mi ticket");
    assert_eq!(
        comment.attachment_url(),
        Some("https://scontent.example/receipt.jpg")
    );
}

#[test]
fn missing_from_defaults_to_unknown() {
    // Privacy-restricted accounts come back without a `from` field.
    let json = r#"{
        "data": [{"id": "1", "created_time": "t"}]
    }"#;

    let page: CommentsPage = serde_json::from_str(json).unwrap();
    let comment = Comment::from(page.data.into_iter().next().unwrap());
    assert_eq!(comment.author_id, "Unknown");
    assert_eq!(comment.author_name, "Unknown");
}

#[test]
fn missing_message_defaults() {
    let json = r#"{"data": [{"id": "1", "created_time": "t"}]}"#;
    let page: CommentsPage = serde_json::from_str(json).unwrap();
    let comment = Comment::from(page.data.into_iter().next().unwrap());
    assert_eq!(comment.message, "No message");
}

#[test]
fn no_attachment_means_no_url() {
    let json = r#"{"data": [{"id": "1", "created_time": "t", "message": "solo texto"}]}"#;
    let page: CommentsPage = serde_json::from_str(json).unwrap();
    let comment = Comment::from(page.data.into_iter().next().unwrap());
    assert_eq!(comment.attachment_url(), None);
}

#[test]
fn malformed_attachment_fails_closed() {
    // Non-photo attachments (links, stickers) carry a different shape.
    // Every variant must read as "no image", never panic or error.
    let shapes = [
        r#"{"type": "share", "url": "https://example.com"}"#,
        r#"{"media": {}}"#,
        r#"{"media": {"image": {}}}"#,
        r#"{"media": {"image": {"src": 42}}}"#,
        r#"{"media": "not-an-object"}"#,
        r#"null"#,
    ];

    for shape in shapes {
        let json = format!(
            r#"{{"data": [{{"id": "1", "created_time": "t", "attachment": {shape}}}]}}"#
        );
        let page: CommentsPage = serde_json::from_str(&json).unwrap();
        let comment = Comment::from(page.data.into_iter().next().unwrap());
        assert_eq!(comment.attachment_url(), None, "shape: {shape}");
    }
}

#[test]
fn empty_page_deserializes() {
    let page: CommentsPage = serde_json::from_str(r#"{"data": []}"#).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.next_cursor(), None);
}

#[test]
fn missing_data_field_deserializes() {
    let page: CommentsPage = serde_json::from_str("{}").unwrap();
    assert!(page.data.is_empty());
}

#[test]
fn paging_without_cursors_has_no_next() {
    let json = r#"{"data": [], "paging": {}}"#;
    let page: CommentsPage = serde_json::from_str(json).unwrap();
    assert_eq!(page.next_cursor(), None);
}

#[test]
fn cursors_without_after_have_no_next() {
    let json = r#"{"data": [], "paging": {"cursors": {"before": "AAA"}}}"#;
    let page: CommentsPage = serde_json::from_str(json).unwrap();
    assert_eq!(page.next_cursor(), None);
}

#[test]
fn post_content_defaults() {
    let raw: RawPost = serde_json::from_str("{}").unwrap();
    let content = PostContent::from(raw);
    assert_eq!(content.message, "No message content");
    assert_eq!(content.created_time, "Unknown time");
    assert_eq!(content.url, "Unknown URL");
}

#[test]
fn post_content_passthrough() {
    let raw: RawPost = serde_json::from_str(
        r#"{"message": "Sube tu ticket", "created_time": "2026-07-30T09:00:00+0000", "permalink_url": "https://facebook.com/p/1"}"#,
    )
    .unwrap();
    let content = PostContent::from(raw);
    assert_eq!(content.message, "Sube tu ticket");
    assert_eq!(content.url, "https://facebook.com/p/1");
}
