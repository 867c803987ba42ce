//! Settings form and first-run flags against a real on-disk store.

use smash_or_pass::config::{Settings, SettingsForm, SettingsPatch, SettingsStore};
use smash_or_pass::onboarding::FirstRun;
use smash_or_pass::storage::{LocalStore, SETTINGS_KEY};
use tempfile::TempDir;

fn open(dir: &TempDir) -> SettingsStore {
    SettingsStore::load_or_default(LocalStore::open(dir.path())).unwrap()
}

#[test]
fn test_form_save_reopens_with_saved_values() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    SettingsForm::from_store(&store)
        .apply(SettingsPatch {
            api_key: Some("xai-test".into()),
            model: Some("grok-4".into()),
            judge: Some("critic".into()),
        })
        .submit(&mut store)
        .unwrap();

    // Present in the persisted record right after save
    let raw = LocalStore::open(dir.path()).get_item(SETTINGS_KEY).unwrap().unwrap();
    let record: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["apiKey"], "xai-test");
    assert_eq!(record["model"], "grok-4");
    assert_eq!(record["judge"], "critic");

    // And pre-populated the next time the form opens, in a fresh process
    let reopened = open(&dir);
    let form = SettingsForm::from_store(&reopened);
    assert_eq!(
        form,
        SettingsForm {
            api_key: "xai-test".into(),
            model: "grok-4".into(),
            judge: "critic".into(),
        }
    );
}

#[test]
fn test_partial_patch_keeps_other_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store
        .set(Settings {
            api_key: "xai-one".into(),
            model: "grok-4".into(),
            judge: "default".into(),
        })
        .unwrap();

    SettingsForm::from_store(&store)
        .apply(SettingsPatch {
            model: Some("grok-2-vision-1212".into()),
            ..Default::default()
        })
        .submit(&mut store)
        .unwrap();

    let reopened = open(&dir);
    assert_eq!(reopened.get().api_key, "xai-one");
    assert_eq!(reopened.get().model, "grok-2-vision-1212");
}

#[test]
fn test_invalid_form_leaves_record_untouched() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let err = SettingsForm::from_store(&store)
        .apply(SettingsPatch {
            judge: Some("nobody".into()),
            ..Default::default()
        })
        .submit(&mut store)
        .unwrap_err();
    assert_eq!(err.category(), "validation");
    assert!(!store.has_saved_settings().unwrap());
}

#[test]
fn test_reload_picks_up_external_write() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    LocalStore::open(dir.path())
        .set_item(SETTINGS_KEY, r#"{"apiKey":"k","model":"m","judge":"brutal"}"#)
        .unwrap();
    assert_eq!(store.get().judge, "default");
    assert_eq!(store.reload().unwrap().judge, "brutal");
}

#[test]
fn test_saving_settings_retires_the_tip() {
    let dir = TempDir::new().unwrap();
    let flags = FirstRun::new(LocalStore::open(dir.path()));
    assert!(flags.settings_tip_pending().unwrap());

    let mut store = open(&dir);
    store.set(Settings::default()).unwrap();
    assert!(!flags.settings_tip_pending().unwrap());
    assert!(!flags.terms_accepted().unwrap());
}
