use anyhow::Result;
use sqlx::types::Uuid;
use tokio::task::JoinSet;

use lextrail_study::{
    Achievement, Announcement, Law, MemoryStudyStore, ProgressStatus, StudyEngine, StudyError,
    StudyStore, StudyTx, User, ViewOutcome,
};

async fn setup() -> (StudyEngine<MemoryStudyStore>, MemoryStudyStore) {
    let store = MemoryStudyStore::new();
    let engine = StudyEngine::new(store.clone());
    (engine, store)
}

async fn seed_student(store: &MemoryStudyStore, email: &str) -> Result<Uuid> {
    let mut tx = store.begin().await?;
    let user = User::new(email, "Aluno Teste");
    tx.insert_user(&user).await?;
    tx.commit().await?;
    Ok(user.id)
}

/// One diploma with `count` topics under it. Returns (diploma, topic ids).
async fn seed_tree(store: &MemoryStudyStore, count: usize) -> Result<(Uuid, Vec<Uuid>)> {
    let mut tx = store.begin().await?;
    let diploma = Law::new_diploma("Constituição Federal");
    tx.insert_law(&diploma).await?;

    let mut topics = Vec::with_capacity(count);
    for index in 0..count {
        let topic = Law::new_topic(diploma.id, &format!("Título {}", index + 1));
        tx.insert_law(&topic).await?;
        topics.push(topic.id);
    }
    tx.commit().await?;
    Ok((diploma.id, topics))
}

async fn seed_catalog(store: &MemoryStudyStore, entries: Vec<Achievement>) -> Result<()> {
    let mut tx = store.begin().await?;
    for achievement in &entries {
        tx.insert_achievement(achievement).await?;
    }
    tx.commit().await?;
    Ok(())
}

#[tokio::test]
async fn test_view_creates_progress_lazily() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "view@example.com").await?;
    let (diploma_id, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    match engine.view_topic(user_id, topic_id).await? {
        ViewOutcome::Topic(view) => {
            assert_eq!(view.status, ProgressStatus::InProgress);
            assert_eq!(view.last_read_position, None);
            assert!(!view.is_favorited);
        }
        other => panic!("expected a topic view, got {:?}", other),
    }

    // repeat views refresh, never regress
    match engine.view_topic(user_id, topic_id).await? {
        ViewOutcome::Topic(view) => assert_eq!(view.status, ProgressStatus::InProgress),
        other => panic!("expected a topic view, got {:?}", other),
    }

    match engine.view_topic(user_id, diploma_id).await? {
        ViewOutcome::Diploma { law_id, .. } => assert_eq!(law_id, diploma_id),
        other => panic!("expected a diploma redirect, got {:?}", other),
    }

    let missing = engine.view_topic(user_id, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StudyError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_bookmark_requires_position() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "bookmark@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    let empty = engine.save_bookmark(user_id, topic_id, "   ").await;
    assert!(matches!(empty, Err(StudyError::Validation(_))));

    // creates the row when absent
    engine.save_bookmark(user_id, topic_id, "art-5").await?;
    match engine.view_topic(user_id, topic_id).await? {
        ViewOutcome::Topic(view) => {
            assert_eq!(view.status, ProgressStatus::InProgress);
            assert_eq!(view.last_read_position.as_deref(), Some("art-5"));
        }
        other => panic!("expected a topic view, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_bookmark_keeps_completed_status() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "completed-bookmark@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    engine.mark_complete(user_id, topic_id).await?;
    engine.save_bookmark(user_id, topic_id, "art-12").await?;

    match engine.view_topic(user_id, topic_id).await? {
        ViewOutcome::Topic(view) => {
            assert_eq!(view.status, ProgressStatus::Completed);
            assert_eq!(view.last_read_position.as_deref(), Some("art-12"));
        }
        other => panic!("expected a topic view, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_mark_complete_awards_once() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "complete@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    let first = engine.mark_complete(user_id, topic_id).await?;
    assert!(!first.already_completed);
    assert_eq!(first.points_awarded, 10);

    let second = engine.mark_complete(user_id, topic_id).await?;
    assert!(second.already_completed);
    assert_eq!(second.points_awarded, 0);

    assert_eq!(engine.user(user_id).await?.points, 10);
    Ok(())
}

#[tokio::test]
async fn test_revert_keeps_points_and_drops_count() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "revert@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    engine.mark_complete(user_id, topic_id).await?;
    engine.revert_to_in_progress(user_id, topic_id).await?;

    let dashboard = engine.dashboard(user_id).await?;
    assert_eq!(dashboard.points, 10, "no refund on revert");
    assert_eq!(dashboard.completed_count, 0, "live count follows status");

    // the completion timestamp survives the revert
    let mut tx = store.begin().await?;
    let row = tx.progress(user_id, topic_id).await?.unwrap();
    assert_eq!(row.status, ProgressStatus::InProgress);
    assert!(row.completed_at.is_some());
    tx.rollback().await?;

    // completing again re-counts but never re-awards
    let again = engine.mark_complete(user_id, topic_id).await?;
    assert!(!again.already_completed);
    assert_eq!(again.points_awarded, 0);

    let dashboard = engine.dashboard(user_id).await?;
    assert_eq!(dashboard.points, 10);
    assert_eq!(dashboard.completed_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_revert_requires_existing_progress() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "revert-missing@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;

    let missing = engine.revert_to_in_progress(user_id, topics[0]).await;
    assert!(matches!(missing, Err(StudyError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_completion_awards_exactly_once() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "race@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.mark_complete(user_id, topic_id).await });
    }

    let mut awarded_total = 0;
    let mut fresh_completions = 0;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined??;
        awarded_total += outcome.points_awarded;
        if !outcome.already_completed {
            fresh_completions += 1;
        }
    }

    assert_eq!(awarded_total, 10, "ten racers, one award");
    assert_eq!(fresh_completions, 1);
    assert_eq!(engine.user(user_id).await?.points, 10);
    Ok(())
}

#[tokio::test]
async fn test_either_threshold_unlocks() -> Result<()> {
    let (_, store) = setup().await;
    // 50 points per completion reaches the points threshold in two topics
    let engine = StudyEngine::with_points(store.clone(), 50);
    let user_id = seed_student(&store, "thresholds@example.com").await?;
    let (_, topics) = seed_tree(&store, 3).await?;

    seed_catalog(
        &store,
        vec![
            Achievement::for_points("Centurião", "Cem pontos.", None, 100),
            Achievement::for_completions("Maratonista", "Três leituras.", None, 3),
        ],
    )
    .await?;
    assert_eq!(engine.reload_catalog().await?, 2);

    let first = engine.mark_complete(user_id, topics[0]).await?;
    assert!(first.newly_unlocked.is_empty());

    // 100 points after two completions, still only two topics done
    let second = engine.mark_complete(user_id, topics[1]).await?;
    assert_eq!(second.newly_unlocked, vec!["Centurião".to_string()]);

    let third = engine.mark_complete(user_id, topics[2]).await?;
    assert_eq!(third.newly_unlocked, vec!["Maratonista".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_no_double_grant_on_reevaluation() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "regrant@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;

    seed_catalog(
        &store,
        vec![Achievement::for_completions("Primeira Leitura", "", None, 1)],
    )
    .await?;
    engine.reload_catalog().await?;

    let outcome = engine.mark_complete(user_id, topics[0]).await?;
    assert_eq!(outcome.newly_unlocked, vec!["Primeira Leitura".to_string()]);

    assert!(engine.evaluate_unlocks(user_id).await?.is_empty());
    assert!(engine.evaluate_unlocks(user_id).await?.is_empty());

    let dashboard = engine.dashboard(user_id).await?;
    assert_eq!(dashboard.achievements.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_primeiro_passo_end_to_end() -> Result<()> {
    let (engine, store) = setup().await;
    assert_eq!(engine.ensure_seed_achievements().await?, 9);
    // second run inserts nothing
    assert_eq!(engine.ensure_seed_achievements().await?, 0);

    let user_id = seed_student(&store, "jornada@example.com").await?;
    let (_, topics) = seed_tree(&store, 5).await?;

    for topic_id in &topics[..4] {
        let outcome = engine.mark_complete(user_id, *topic_id).await?;
        assert!(outcome.newly_unlocked.is_empty());
    }

    let fifth = engine.mark_complete(user_id, topics[4]).await?;
    assert_eq!(fifth.newly_unlocked, vec!["Primeiro Passo".to_string()]);
    assert_eq!(engine.user(user_id).await?.points, 50);

    Ok(())
}

#[tokio::test]
async fn test_dashboard_grants_retroactively() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "retro@example.com").await?;
    let (_, topics) = seed_tree(&store, 5).await?;

    // five completions before any badge exists
    for topic_id in &topics {
        engine.mark_complete(user_id, *topic_id).await?;
    }
    engine.ensure_seed_achievements().await?;

    let dashboard = engine.dashboard(user_id).await?;
    assert_eq!(dashboard.completed_count, 5);
    assert_eq!(dashboard.points, 50);
    assert_eq!(dashboard.newly_unlocked, vec!["Primeiro Passo".to_string()]);
    assert_eq!(dashboard.achievements.len(), 1);
    assert_eq!(dashboard.achievements[0].name, "Primeiro Passo");

    // nothing new on the next visit
    let dashboard = engine.dashboard(user_id).await?;
    assert!(dashboard.newly_unlocked.is_empty());
    assert_eq!(dashboard.achievements.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_announcements_until_dismissed() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "avisos@example.com").await?;

    let announcement = Announcement::new("Bem-vindo", "Nova turma aberta.");
    let mut inactive = Announcement::new("Rascunho", "Ainda não publicado.");
    inactive.is_active = false;
    store.insert_announcement(announcement.clone()).await;
    store.insert_announcement(inactive).await;

    let dashboard = engine.dashboard(user_id).await?;
    assert_eq!(dashboard.announcements.len(), 1);
    assert_eq!(dashboard.announcements[0].title, "Bem-vindo");

    engine.dismiss_announcement(user_id, announcement.id).await?;
    // dismissing twice is fine
    engine.dismiss_announcement(user_id, announcement.id).await?;

    let dashboard = engine.dashboard(user_id).await?;
    assert!(dashboard.announcements.is_empty());

    let missing = engine.dismiss_announcement(user_id, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StudyError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_registration_and_approval() -> Result<()> {
    let (engine, _) = setup().await;

    let user = engine
        .register_user("  Aluno@Example.COM ", " Maria Silva ")
        .await?;
    assert_eq!(user.email, "aluno@example.com");
    assert_eq!(user.display_name, "Maria Silva");
    assert!(!user.is_approved);

    let duplicate = engine.register_user("ALUNO@example.com", "Outra").await;
    assert!(matches!(duplicate, Err(StudyError::Conflict(_))));

    let invalid = engine.register_user("sem-arroba", "Alguém").await;
    assert!(matches!(invalid, Err(StudyError::Validation(_))));

    let pending = engine.pending_users().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, user.id);

    engine.approve_user(user.id).await?;
    assert!(engine.pending_users().await?.is_empty());
    assert!(engine.user(user.id).await?.is_approved);

    Ok(())
}

#[tokio::test]
async fn test_purchase_webhook_approves_by_email() -> Result<()> {
    let (engine, _) = setup().await;

    let user = engine.register_user("comprador@example.com", "Comprador").await?;
    assert!(engine.approve_purchase("Comprador@Example.com").await?);
    assert!(engine.user(user.id).await?.is_approved);

    // already approved stays a success
    assert!(engine.approve_purchase("comprador@example.com").await?);

    // unknown email is reported back as unmatched, not an error
    assert!(!engine.approve_purchase("ninguem@example.com").await?);

    Ok(())
}

#[tokio::test]
async fn test_hierarchy_is_capped_at_two_levels() -> Result<()> {
    let (_, store) = setup().await;
    let (_, topics) = seed_tree(&store, 1).await?;

    let mut tx = store.begin().await?;
    let nested = Law::new_topic(topics[0], "Subtópico inválido");
    let too_deep = tx.insert_law(&nested).await;
    assert!(matches!(too_deep, Err(StudyError::Validation(_))));

    let orphan = Law::new_topic(Uuid::new_v4(), "Sem diploma");
    let missing_parent = tx.insert_law(&orphan).await;
    assert!(matches!(missing_parent, Err(StudyError::NotFound(_))));
    tx.rollback().await?;

    Ok(())
}

#[tokio::test]
async fn test_favorites_toggle() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "favorito@example.com").await?;
    let (diploma_id, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    assert!(engine.toggle_favorite(user_id, topic_id).await?);
    match engine.view_topic(user_id, topic_id).await? {
        ViewOutcome::Topic(view) => assert!(view.is_favorited),
        other => panic!("expected a topic view, got {:?}", other),
    }

    assert!(!engine.toggle_favorite(user_id, topic_id).await?);

    let on_diploma = engine.toggle_favorite(user_id, diploma_id).await;
    assert!(matches!(on_diploma, Err(StudyError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_notes_and_markups_upsert() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "notas@example.com").await?;
    let (diploma_id, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    assert!(engine.note(user_id, topic_id).await?.is_none());

    engine.save_note(user_id, topic_id, "Revisar o caput.").await?;
    engine.save_note(user_id, topic_id, "Revisar o caput e o §1º.").await?;
    let note = engine.note(user_id, topic_id).await?.unwrap();
    assert_eq!(note.content, "Revisar o caput e o §1º.");

    engine.save_markup(user_id, topic_id, "{\"ranges\":[[3,9]]}").await?;
    let markup = engine.markup(user_id, topic_id).await?.unwrap();
    assert_eq!(markup.content, "{\"ranges\":[[3,9]]}");

    let on_diploma = engine.save_note(user_id, diploma_id, "x").await;
    assert!(matches!(on_diploma, Err(StudyError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_comments_in_insertion_order() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "comentario@example.com").await?;
    let (_, topics) = seed_tree(&store, 1).await?;
    let topic_id = topics[0];

    let blank = engine.add_comment(user_id, topic_id, "par-1", "   ").await;
    assert!(matches!(blank, Err(StudyError::Validation(_))));
    let no_anchor = engine.add_comment(user_id, topic_id, "", "Texto").await;
    assert!(matches!(no_anchor, Err(StudyError::Validation(_))));

    engine
        .add_comment(user_id, topic_id, "par-1", "Primeira observação.")
        .await?;
    engine
        .add_comment(user_id, topic_id, "par-2", "Segunda observação.")
        .await?;

    let comments = engine.comments(topic_id).await?;
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].content, "Primeira observação.");
    assert_eq!(comments[1].content, "Segunda observação.");
    assert_eq!(comments[0].anchor_paragraph_id, "par-1");

    Ok(())
}
