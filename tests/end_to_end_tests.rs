use partitioned_compress::end_to_end::{compress_xml, decompress_xml};
use partitioned_compress::principal::{attribute_partition_policy, Principal};

#[cfg(feature = "sqlite")]
use partitioned_compress::end_to_end::{compress_sqlite, decompress_sqlite};
#[cfg(feature = "sqlite")]
use partitioned_compress::partition::sqlite::SqliteDataUnit;

#[cfg(feature = "filesystem")]
use partitioned_compress::end_to_end::dedup_files;
#[cfg(feature = "filesystem")]
use partitioned_compress::partition::filesystem::owner_prefix_principal;

// `author` is carried as an attribute, not nested element text: a streaming
// partitioner classifies an element from its own tag and attributes only,
// before any of its children have been seen (see DESIGN.md).
const CATALOG: &[u8] = br#"<catalog>
   <book author="Gambardella, Matthew"><title>XML Developer's Guide</title></book>
   <book author="Ralls, Kim"><title>Midnight Rain</title></book>
   <book author="Corets, Eva"><title>Maeve Ascendant</title></book>
</catalog>
"#;

#[test]
fn xml_catalog_round_trips_and_isolates_books_by_author() {
    let access = |du: &partitioned_compress::partition::xml::XmlDataUnit| {
        if du.stack.last().map(|e| e.tag.as_str()) == Some("book") {
            let author = du
                .stack
                .last()
                .unwrap()
                .attributes
                .iter()
                .find(|(k, _)| k.as_str() == "author")
                .map(|(_, v)| v.clone());
            if let Some(author) = author {
                return Principal::new([("owner".to_string(), author.into())]);
            }
        }
        Principal::null()
    };
    let partition = attribute_partition_policy("owner");

    let compressed = compress_xml(CATALOG, &access, &partition).unwrap();
    let decompressed = decompress_xml(&compressed).unwrap();
    assert_eq!(decompressed, CATALOG);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_messages_round_trip_when_partitioned_by_group_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messages.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE message (id INTEGER PRIMARY KEY, gid INTEGER, body TEXT);",
        )
        .unwrap();
        for (gid, body) in [
            (1, "hello"),
            (1, "world"),
            (2, "foo"),
            (7, "bar"),
            (7, "baz"),
            (7, "qux"),
        ] {
            conn.execute(
                "INSERT INTO message (gid, body) VALUES (?1, ?2)",
                rusqlite::params![gid, body],
            )
            .unwrap();
        }
    }

    let access = |du: &SqliteDataUnit| {
        if du.table_name == "message" {
            if let Some(partitioned_compress::partition::sqlite::SqlValue::Int(gid)) = du.row.get(1) {
                return Principal::new([("gid".to_string(), (*gid).into())]);
            }
        }
        Principal::null()
    };
    let partition = attribute_partition_policy("gid");

    let compressed = compress_sqlite(&path, &access, &partition).unwrap();
    let decompressed = decompress_sqlite(&compressed).unwrap();
    let original = std::fs::read(&path).unwrap();
    assert_eq!(decompressed, original);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_text_column_eight_times_page_size_spans_overflow_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overflow.db");
    let big_text = "x".repeat(8 * 4096);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE blobs (id INTEGER PRIMARY KEY, content TEXT);")
            .unwrap();
        conn.execute(
            "INSERT INTO blobs (content) VALUES (?1)",
            rusqlite::params![big_text],
        )
        .unwrap();
    }

    let access = |du: &SqliteDataUnit| {
        if du.table_name == "blobs" {
            return Principal::new([("owner".to_string(), "alice".into())]);
        }
        Principal::null()
    };
    let partition = attribute_partition_policy("owner");

    let compressed = compress_sqlite(&path, &access, &partition).unwrap();
    let decompressed = decompress_sqlite(&compressed).unwrap();
    let original = std::fs::read(&path).unwrap();
    assert_eq!(decompressed, original);
}

#[cfg(feature = "filesystem")]
#[test]
fn filesystem_dedup_keeps_identical_files_from_distinct_principals() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bob_a"), b"shared content").unwrap();
    std::fs::write(dir.path().join("bob_a_copy"), b"shared content").unwrap();
    std::fs::write(dir.path().join("alice_a"), b"shared content").unwrap();

    let access = |du: &partitioned_compress::partition::filesystem::FsDataUnit| owner_prefix_principal(du);
    let partition = attribute_partition_policy("owner");
    let deduped = dedup_files(dir.path(), &access, &partition).unwrap();

    assert_eq!(deduped.len(), 2);
    let owners: Vec<String> = deduped
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().split('_').next().unwrap().to_string())
        .collect();
    assert!(owners.contains(&"bob".to_string()));
    assert!(owners.contains(&"alice".to_string()));
}
