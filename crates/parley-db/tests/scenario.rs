/// End-to-end flows against a file-backed database with reader connections,
/// so every read goes through a separate connection from the writes.
use parley_db::{Database, DbError, ErrorKind};
use parley_types::{ContentType, ConversationKind, MessageStatus};
use tempfile::TempDir;

fn open() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_with_readers(&dir.path().join("parley.db"), 2).unwrap();
    (dir, db)
}

#[test]
fn alice_and_bob() {
    let (_dir, db) = open();
    let alice = db.login("alice").unwrap();
    let bob = db.login("bob").unwrap();
    assert!(alice.created && bob.created);

    // Alice writes to Bob for the first time.
    assert!(
        !db.direct_conversation_exists(&alice.user.id, &bob.user.id)
            .unwrap()
    );
    let (conv, first) = db
        .start_direct(&alice.user.id, &bob.user.id, "hi bob", ContentType::Text)
        .unwrap();
    assert_eq!(conv.kind, ConversationKind::Direct);

    // Bob sees the conversation under Alice's name and replies.
    let bobs = db.list_for_user(&bob.user.id).unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].display_name, "alice");
    let reply = db
        .send(conv.id, &bob.user.id, "hey alice", ContentType::Text)
        .unwrap();

    // A second attempt to start the conversation is refused.
    assert!(matches!(
        db.start_direct(&bob.user.id, &alice.user.id, "again?", ContentType::Text),
        Err(DbError::DirectConversationExists)
    ));

    // Bob comments on Alice's first message, Alice promotes the comment.
    db.comment(first.id, &bob.user.id, "welcome!", ContentType::Text)
        .unwrap();
    let promoted = db
        .promote_comments(first.id, conv.id, &alice.user.id)
        .unwrap();
    assert_eq!(promoted.len(), 1);
    assert_eq!(promoted[0].sender_id, bob.user.id);

    let history = db.list_by_conversation(conv.id, &alice.user.id).unwrap();
    let summary: Vec<(&str, &str, MessageStatus)> = history
        .iter()
        .map(|m| {
            (
                m.sender_name.as_str(),
                m.message.content.as_str(),
                m.message.status,
            )
        })
        .collect();
    assert_eq!(
        summary,
        [
            ("alice", "hi bob", MessageStatus::Sent),
            ("bob", "hey alice", MessageStatus::Sent),
            ("bob", "welcome!", MessageStatus::CommentConverted),
        ]
    );

    // Alice cannot delete Bob's reply, but can delete her own message.
    assert_eq!(
        db.delete_message(reply.id, &alice.user.id)
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );
    db.delete_message(first.id, &alice.user.id).unwrap();
    let remaining: Vec<(String, MessageStatus)> = db
        .list_by_conversation(conv.id, &bob.user.id)
        .unwrap()
        .into_iter()
        .map(|m| (m.message.content, m.message.status))
        .collect();
    assert_eq!(
        remaining,
        [
            ("hey alice".to_string(), MessageStatus::Sent),
            ("welcome!".to_string(), MessageStatus::CommentConverted),
        ]
    );
}

#[test]
fn rename_shows_up_in_peer_listing() {
    let (_dir, db) = open();
    let alice = db.create_or_get_user("alice").unwrap();
    let bob = db.create_or_get_user("bob").unwrap();
    db.create_direct(&alice.id, &bob.id).unwrap();

    db.rename(&alice.id, "alicia").unwrap();

    let bobs = db.list_for_user(&bob.id).unwrap();
    assert_eq!(bobs[0].display_name, "alicia");
    assert_eq!(db.find_user_by_name("alice").unwrap(), None);

    // The old name is free for someone else now.
    let newcomer = db.create_or_get_user("alice").unwrap();
    assert_ne!(newcomer.id, alice.id);
}

#[test]
fn group_lifecycle() {
    let (_dir, db) = open();
    let alice = db.create_or_get_user("alice").unwrap();
    let bob = db.create_or_get_user("bob").unwrap();
    let carol = db.create_or_get_user("carol").unwrap();

    let group = db
        .create_group(&alice.id, "weekend", &[bob.id], None)
        .unwrap();
    db.add_member(&bob.id, group.id, &carol.id).unwrap();
    db.send(group.id, &carol.id, "/uploads/map.png", ContentType::Photo)
        .unwrap();

    assert!(!db.remove_member(group.id, &alice.id).unwrap());
    assert!(!db.remove_member(group.id, &bob.id).unwrap());
    assert_eq!(
        db.send(group.id, &bob.id, "wait", ContentType::Text)
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );
    assert!(db.list_for_user(&bob.id).unwrap().is_empty());

    assert!(db.remove_member(group.id, &carol.id).unwrap());
    assert_eq!(
        db.get_conversation(group.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(db.list_for_user(&carol.id).unwrap().is_empty());
}

#[test]
fn forward_between_conversations() {
    let (_dir, db) = open();
    let alice = db.create_or_get_user("alice").unwrap();
    let bob = db.create_or_get_user("bob").unwrap();
    let carol = db.create_or_get_user("carol").unwrap();

    let (with_bob, msg) = db
        .start_direct(&bob.id, &alice.id, "/uploads/meme.gif", ContentType::Gif)
        .unwrap();
    let with_carol = db.create_direct(&alice.id, &carol.id).unwrap();

    let copy = db
        .forward(with_bob.id, msg.id, with_carol.id, &alice.id)
        .unwrap();
    assert_eq!(copy.status, MessageStatus::Forwarded);
    assert_eq!(copy.content_type, ContentType::Gif);

    // Bob is not in Alice's conversation with Carol.
    assert_eq!(
        db.forward(with_bob.id, msg.id, with_carol.id, &bob.id)
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        db.list_by_conversation(with_carol.id, &carol.id)
            .unwrap()
            .len(),
        1
    );

    // Carol's listing now leads with the forwarded message's conversation.
    let carols = db.list_for_user(&carol.id).unwrap();
    assert_eq!(carols[0].id, with_carol.id);
    assert_eq!(carols[0].last_activity, copy.created_at);
}
