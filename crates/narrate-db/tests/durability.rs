//! Progress written through the adapters survives closing and reopening the
//! database file.

use narrate_core::{
    Chapter, ChapterRepository, ContinueMode, NarrationSettings, Novel, ProgressStore,
    SettingsRepository, keys,
};
use narrate_db::{StorageFactory, setup_database};

#[tokio::test]
async fn progress_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("narrate.db");

    let pool = setup_database(&path).await.unwrap();
    let repos = StorageFactory::build_repos(pool.clone());
    repos
        .chapters
        .upsert_novel(&Novel {
            id: 3,
            name: "Salt and Iron".to_string(),
        })
        .await
        .unwrap();
    repos
        .chapters
        .upsert_chapter(&Chapter {
            id: 30,
            novel_id: 3,
            name: None,
            chapter_number: Some(1.0),
            position: 1,
            progress: None,
            unread: true,
            tts_state: None,
        })
        .await
        .unwrap();
    repos.chapters.update_progress(30, 64).await.unwrap();
    repos
        .progress
        .set_number(&keys::chapter_progress(30), 17)
        .await
        .unwrap();
    repos
        .settings
        .save(&NarrationSettings {
            continue_to_next_chapter: ContinueMode::Continuous,
            ..NarrationSettings::default()
        })
        .await
        .unwrap();
    pool.close().await;

    let repos = StorageFactory::build_repos(setup_database(&path).await.unwrap());

    let chapter = repos.chapters.get_chapter(30).await.unwrap().unwrap();
    assert_eq!(chapter.progress, Some(64));
    assert_eq!(chapter.display_name(), "Chapter 1");
    assert_eq!(
        repos
            .progress
            .get_number(&keys::chapter_progress(30))
            .await
            .unwrap(),
        Some(17)
    );
    assert_eq!(
        repos.settings.load().await.unwrap().continue_to_next_chapter,
        ContinueMode::Continuous
    );
    let recent = repos.chapters.recent_reading_chapters(3, 5).await.unwrap();
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn chapter_for_unknown_novel_is_a_constraint_error() {
    let dir = tempfile::tempdir().unwrap();
    let repos = StorageFactory::build_repos(
        setup_database(&dir.path().join("narrate.db")).await.unwrap(),
    );

    let result = repos
        .chapters
        .upsert_chapter(&Chapter {
            id: 1,
            novel_id: 404,
            name: None,
            chapter_number: None,
            position: 1,
            progress: None,
            unread: true,
            tts_state: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(narrate_core::RepositoryError::Constraint(_))
    ));
}
