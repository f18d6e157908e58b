use quotebook_core::db::open_db_in_memory;
use quotebook_core::{
    CatalogRepository, CatalogValidationError, CreateQuoteInput, NewSource, QuoteFilter,
    QuoteService, RepoError, SqliteCatalogRepository, SqliteQuoteRepository,
};
use rusqlite::Connection;

#[test]
fn tags_are_trimmed_and_listed_by_id() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    let energy = catalog.create_tag("  energy ").unwrap();
    let biomass = catalog.create_tag("biomass").unwrap();

    assert_eq!(energy.text, "energy");
    let listed = catalog.list_tags().unwrap();
    assert_eq!(listed, vec![energy, biomass]);
}

#[test]
fn duplicate_tag_text_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    catalog.create_tag("energy").unwrap();

    let err = catalog.create_tag("energy").unwrap_err();
    assert!(matches!(
        err,
        RepoError::Duplicate {
            entity: "tag",
            field: "text"
        }
    ));
}

#[test]
fn blank_catalog_names_fail_validation() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    assert!(matches!(
        catalog.create_tag("   ").unwrap_err(),
        RepoError::Validation(CatalogValidationError::BlankTagText)
    ));
    assert!(matches!(
        catalog.create_source_type("").unwrap_err(),
        RepoError::Validation(CatalogValidationError::BlankSourceTypeName)
    ));
}

#[test]
fn source_with_unknown_type_is_a_foreign_key_error() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    let err = catalog
        .create_source(&NewSource {
            author: Some("Anonymous".to_string()),
            source_type_id: Some(77),
            ..NewSource::default()
        })
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::ForeignKey {
            entity: "source",
            field: "source_type_id"
        }
    ));
    assert!(catalog.list_sources().unwrap().is_empty());
}

#[test]
fn source_round_trips_with_blank_fields_dropped() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let website = catalog.create_source_type("Website").unwrap();

    let created = catalog
        .create_source(&NewSource {
            author: Some(" FAO ".to_string()),
            topic: Some("  ".to_string()),
            url: Some("https://www.fao.org/3/t0512e/T0512e00.htm".to_string()),
            source_type_id: Some(website.id),
            ..NewSource::default()
        })
        .unwrap();

    assert_eq!(created.author.as_deref(), Some("FAO"));
    assert_eq!(created.topic, None);
    assert_eq!(catalog.get_source(created.id).unwrap(), Some(created.clone()));
    assert_eq!(catalog.get_source(created.id + 1).unwrap(), None);
}

#[test]
fn repositories_refuse_unmigrated_connections() {
    let mut conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteCatalogRepository::try_new(&conn).err().unwrap(),
        RepoError::MissingRequiredTable("source_types")
    ));
    assert!(matches!(
        SqliteQuoteRepository::try_new(&mut conn).err().unwrap(),
        RepoError::MissingRequiredTable("quotes")
    ));
}

#[test]
fn quotes_without_filter_returns_every_quote() {
    let mut conn = open_db_in_memory().unwrap();
    let (first, second) = two_sources(&conn);
    let ids = [
        add_quote(&mut conn, "a", first),
        add_quote(&mut conn, "b", second),
        add_quote(&mut conn, "c", first),
    ];

    let repo = SqliteQuoteRepository::try_new(&mut conn).unwrap();
    let quotes = QuoteService::new(repo).get_quotes_by(None).unwrap();

    assert_eq!(
        quotes.iter().map(|quote| quote.id).collect::<Vec<_>>(),
        ids.to_vec()
    );
}

#[test]
fn quotes_filtered_by_source_only_returns_that_source() {
    let mut conn = open_db_in_memory().unwrap();
    let (first, second) = two_sources(&conn);
    let a = add_quote(&mut conn, "a", first);
    add_quote(&mut conn, "b", second);
    let c = add_quote(&mut conn, "c", first);

    let repo = SqliteQuoteRepository::try_new(&mut conn).unwrap();
    let service = QuoteService::new(repo);
    let quotes = service
        .get_quotes_by(Some(QuoteFilter::by_source(first)))
        .unwrap();
    assert_eq!(
        quotes.iter().map(|quote| quote.id).collect::<Vec<_>>(),
        vec![a, c]
    );
    assert!(quotes.iter().all(|quote| quote.source_id == first));

    let unknown = service
        .get_quotes_by(Some(QuoteFilter::by_source(second + 100)))
        .unwrap();
    assert!(unknown.is_empty());
}

#[test]
fn quote_tags_lists_attached_tags_by_id() {
    let mut conn = open_db_in_memory().unwrap();
    let (source, _) = two_sources(&conn);
    let (later, earlier) = {
        let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
        let earlier = catalog.create_tag("gasifier").unwrap();
        let later = catalog.create_tag("tar").unwrap();
        (later, earlier)
    };

    let repo = SqliteQuoteRepository::try_new(&mut conn).unwrap();
    let mut service = QuoteService::new(repo);
    let created = service
        .create_with_tags(
            CreateQuoteInput::new("Tagged", source)
                .with_tags([later.id.to_string(), earlier.id.to_string()]),
        )
        .unwrap();

    assert_eq!(
        service.quote_tags(created.quote.id).unwrap(),
        vec![earlier, later]
    );
}

fn two_sources(conn: &Connection) -> (i64, i64) {
    let catalog = SqliteCatalogRepository::try_new(conn).unwrap();
    let book = catalog.create_source_type("Book").unwrap();
    let first = catalog
        .create_source(&NewSource {
            author: Some("T. B. Reed".to_string()),
            source_type_id: Some(book.id),
            ..NewSource::default()
        })
        .unwrap();
    let second = catalog
        .create_source(&NewSource {
            author: Some("A. Kaupp".to_string()),
            source_type_id: Some(book.id),
            ..NewSource::default()
        })
        .unwrap();
    (first.id, second.id)
}

fn add_quote(conn: &mut Connection, text: &str, source_id: i64) -> i64 {
    let repo = SqliteQuoteRepository::try_new(conn).unwrap();
    QuoteService::new(repo)
        .create_with_tags(CreateQuoteInput::new(text, source_id))
        .unwrap()
        .quote
        .id
}
