use recordstore::{Model, Store};
use recordstore::core::config::StoreConfig;
use recordstore::entities::{GuildProfile, Supporter};
use serde_json::{Value, json};
use std::fs;
use tempfile::{TempDir, tempdir};

const NOW: &str = "2026-10-19T12:00:00Z";

fn stores() -> (TempDir, Vec<Store>) {
    let tmp = tempdir().expect("tempdir");
    let files = Store::new(StoreConfig::with_uri(
        tmp.path().join("files").to_string_lossy(),
    ));
    let database = Store::new(StoreConfig::with_uri(format!(
        "sqlite://{}",
        tmp.path().join("records.db").display()
    )));
    (tmp, vec![files, database])
}

#[test]
fn supporter_guild_edits_persist_on_both_backends() {
    let (_tmp, stores) = stores();
    for store in &stores {
        let mut supporter = Supporter::new("user-1");
        supporter.set_max_guilds(Some(2));
        supporter.add_guild("g1");
        supporter.add_guild("g2");
        store.save(&mut supporter).expect("insert");
        assert!(store.is_saved(&supporter));

        let mut loaded = store.get::<Supporter>("user-1").unwrap().expect("saved");
        assert_eq!(loaded.guilds(), vec!["g1", "g2"]);
        assert_eq!(loaded.max_guilds(), 2);
        assert!(!loaded.has_capacity());

        assert!(loaded.remove_guild("g1"));
        store.save(&mut loaded).expect("update");

        let reloaded = store.get::<Supporter>("user-1").unwrap().unwrap();
        assert_eq!(reloaded.guilds(), vec!["g2"]);
        assert_eq!(reloaded.id(), Some("user-1"));
    }
}

#[test]
fn clearing_a_supporter_field_removes_it_from_storage() {
    let (_tmp, stores) = stores();
    for store in &stores {
        let mut supporter = Supporter::new("user-2");
        supporter.set_comment(Some("early backer"));
        store.save(&mut supporter).unwrap();

        let mut loaded = store.get::<Supporter>("user-2").unwrap().unwrap();
        assert_eq!(loaded.comment(), Some("early backer"));
        loaded.set_comment(None);
        store.save(&mut loaded).unwrap();

        let reloaded = store.get::<Supporter>("user-2").unwrap().unwrap();
        assert_eq!(reloaded.comment(), None);
        assert_eq!(reloaded.record().get_field("comment"), None);
    }
}

#[test]
fn valid_guilds_skip_expired_and_lapsed_supporters() {
    let (_tmp, stores) = stores();
    for store in &stores {
        let mut active = Supporter::new("active");
        active.set_max_guilds(Some(3));
        active.add_guild("g1");
        active.add_guild("g2");
        active.set_expire_at(Some("2027-01-01T00:00:00Z"));

        let mut expired = Supporter::new("expired");
        expired.add_guild("g3");
        expired.set_expire_at(Some("2026-01-01T00:00:00Z"));

        let mut lapsed = Supporter::new("lapsed");
        lapsed.add_guild("g4");
        lapsed.set_patron(Some(false));

        let mut overlap = Supporter::new("overlap");
        overlap.add_guild("g2");

        for supporter in [&mut active, &mut expired, &mut lapsed, &mut overlap] {
            store.save(supporter).unwrap();
        }

        let mut guilds = Supporter::valid_guilds(store, NOW).unwrap();
        guilds.sort();
        assert_eq!(guilds, vec!["g1", "g2"]);
    }
}

#[test]
fn guild_profile_date_settings_are_omitted_when_empty() {
    let (tmp, stores) = stores();
    let files = &stores[0];

    let mut profile = GuildProfile::new("guild-1", "Guild One");
    files.save(&mut profile).unwrap();
    let path = tmp.path().join("files").join("guilds").join("guild-1.json");
    let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, json!({"_id": "guild-1", "name": "Guild One"}));

    profile.set_prefix(Some("!"));
    profile.set_date_setting("timezone", "Europe/Paris");
    files.save(&mut profile).unwrap();
    let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({
            "_id": "guild-1",
            "name": "Guild One",
            "prefix": "!",
            "dateSettings": {"timezone": "Europe/Paris"}
        })
    );
}

#[test]
fn guild_profile_lookup_by_name_on_both_backends() {
    let (_tmp, stores) = stores();
    for store in &stores {
        let mut one = GuildProfile::new("guild-1", "Guild One");
        one.set_locale(Some("fr-FR"));
        store.save(&mut one).unwrap();
        store.save(&mut GuildProfile::new("guild-2", "Guild Two")).unwrap();

        let found = store
            .get_by::<GuildProfile>("name", "Guild One")
            .unwrap()
            .expect("match");
        assert_eq!(found.id(), Some("guild-1"));
        assert_eq!(found.locale(), Some("fr-FR"));
        assert_eq!(found.prefix_or("rss."), "rss.");

        let all = store.get_all::<GuildProfile>().unwrap();
        let mut names: Vec<&str> = all.iter().map(GuildProfile::name).collect();
        names.sort();
        assert_eq!(names, vec!["Guild One", "Guild Two"]);
    }
}

#[test]
fn deleting_a_profile_removes_it() {
    let (_tmp, stores) = stores();
    for store in &stores {
        let mut profile = GuildProfile::new("guild-9", "Nine");
        store.save(&mut profile).unwrap();
        store.delete(&profile).unwrap();
        assert!(store.get::<GuildProfile>("guild-9").unwrap().is_none());
    }
}
