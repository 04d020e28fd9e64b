use duet_core::db::open_db_in_memory;
use duet_core::{
    CoupleService, Identity, SqliteCoupleRepository, SqliteWordsRepository, WordsService,
    WordsServiceError, WORDS_PAGE_SIZE,
};
use rusqlite::Connection;

fn couple_for(conn: &Connection, email: &str) -> i64 {
    let service = CoupleService::new(SqliteCoupleRepository::try_new(conn).unwrap());
    service
        .resolve_or_create(&Identity::parse(email).unwrap())
        .unwrap()
}

#[test]
fn blank_text_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let couple_id = couple_for(&conn, "a@x.com");
    let words = WordsService::new(SqliteWordsRepository::try_new(&conn).unwrap());

    for blank in ["", "   ", "\n\t "] {
        assert!(matches!(
            words.add(couple_id, blank),
            Err(WordsServiceError::EmptyText)
        ));
    }
    assert!(words.list(couple_id).unwrap().is_empty());
}

#[test]
fn accepted_text_round_trips_exactly() {
    let conn = open_db_in_memory().unwrap();
    let couple_id = couple_for(&conn, "a@x.com");
    let words = WordsService::new(SqliteWordsRepository::try_new(&conn).unwrap());

    let text = "  you & me 💕\nalways  ";
    words.add(couple_id, text).unwrap();

    let listed = words.list(couple_id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].text.as_bytes(), text.as_bytes());
}

#[test]
fn listing_is_scoped_newest_first_and_bounded() {
    let conn = open_db_in_memory().unwrap();
    let ours = couple_for(&conn, "a@x.com");
    let theirs = couple_for(&conn, "c@x.com");
    let words = WordsService::new(SqliteWordsRepository::try_new(&conn).unwrap());

    for idx in 0..25 {
        words.add(ours, &format!("note {idx}")).unwrap();
    }
    words.add(theirs, "not yours").unwrap();

    let listed = words.list(ours).unwrap();
    assert_eq!(listed.len(), WORDS_PAGE_SIZE as usize);
    assert_eq!(listed[0].text, "note 24");
    assert!(listed.iter().all(|word| word.couple_id == ours));
}

#[test]
fn delete_is_scoped_to_the_couple() {
    let conn = open_db_in_memory().unwrap();
    let ours = couple_for(&conn, "a@x.com");
    let theirs = couple_for(&conn, "c@x.com");
    let words = WordsService::new(SqliteWordsRepository::try_new(&conn).unwrap());

    let theirs_word = words.add(theirs, "hands off").unwrap();
    assert!(matches!(
        words.delete(ours, theirs_word.id),
        Err(WordsServiceError::WordNotFound(_))
    ));
    assert_eq!(words.list(theirs).unwrap().len(), 1);

    words.delete(theirs, theirs_word.id).unwrap();
    assert!(words.list(theirs).unwrap().is_empty());
}
