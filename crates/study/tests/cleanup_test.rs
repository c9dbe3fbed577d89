use anyhow::Result;
use sqlx::types::Uuid;

use lextrail_study::{
    Achievement, Announcement, Law, MemoryStudyStore, StudyEngine, StudyError, StudyStore,
    StudyTx, User, ViewOutcome,
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

async fn seed_tree(store: &MemoryStudyStore, count: usize) -> Result<(Uuid, Vec<Uuid>)> {
    let mut tx = store.begin().await?;
    let diploma = Law::new_diploma("Código Civil");
    tx.insert_law(&diploma).await?;

    let mut topics = Vec::with_capacity(count);
    for index in 0..count {
        let topic = Law::new_topic(diploma.id, &format!("Livro {}", index + 1));
        tx.insert_law(&topic).await?;
        topics.push(topic.id);
    }
    tx.commit().await?;
    Ok((diploma.id, topics))
}

#[tokio::test]
async fn test_purge_user_counts_every_dependent_row() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "sair@example.com").await?;
    let (_, topics) = seed_tree(&store, 2).await?;

    let mut tx = store.begin().await?;
    tx.insert_achievement(&Achievement::for_completions("Primeira Leitura", "", None, 1))
        .await?;
    tx.commit().await?;
    engine.reload_catalog().await?;

    let announcement = Announcement::new("Aviso", "Manutenção no domingo.");
    store.insert_announcement(announcement.clone()).await;

    engine.mark_complete(user_id, topics[0]).await?;
    engine.save_bookmark(user_id, topics[1], "art-1").await?;
    engine.toggle_favorite(user_id, topics[0]).await?;
    engine.save_note(user_id, topics[0], "Reler o capítulo.").await?;
    engine.save_markup(user_id, topics[0], "{}").await?;
    engine
        .add_comment(user_id, topics[0], "par-3", "Dúvida sobre o prazo.")
        .await?;
    engine.dismiss_announcement(user_id, announcement.id).await?;

    let report = engine.purge_user(user_id).await?;
    assert_eq!(report.comments, 1);
    assert_eq!(report.notes, 1);
    assert_eq!(report.markups, 1);
    assert_eq!(report.favorites, 1);
    assert_eq!(report.seen_markers, 1);
    assert_eq!(report.progress_rows, 2);
    assert_eq!(report.achievement_links, 1);
    assert_eq!(report.users, 1);
    assert_eq!(report.laws, 0);

    let gone = engine.user(user_id).await;
    assert!(matches!(gone, Err(StudyError::NotFound(_))));

    // reference content survives for everyone else
    let other = seed_student(&store, "fica@example.com").await?;
    assert!(matches!(
        engine.view_topic(other, topics[0]).await?,
        ViewOutcome::Topic(_)
    ));

    Ok(())
}

#[tokio::test]
async fn test_purge_unknown_user_is_not_found() -> Result<()> {
    let (engine, _) = setup().await;
    let missing = engine.purge_user(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StudyError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_purge_diploma_takes_its_topics_along() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "limpar@example.com").await?;
    let (diploma_id, topics) = seed_tree(&store, 2).await?;

    engine.mark_complete(user_id, topics[0]).await?;
    engine.mark_complete(user_id, topics[1]).await?;
    engine.save_note(user_id, topics[0], "Anotação.").await?;
    engine
        .add_comment(user_id, topics[1], "par-1", "Comentário.")
        .await?;
    engine.toggle_favorite(user_id, topics[0]).await?;

    let report = engine.purge_law(diploma_id).await?;
    assert_eq!(report.laws, 3, "diploma plus two topics");
    assert_eq!(report.progress_rows, 2);
    assert_eq!(report.notes, 1);
    assert_eq!(report.comments, 1);
    assert_eq!(report.favorites, 1);
    assert_eq!(report.users, 0);

    let gone = engine.view_topic(user_id, topics[0]).await;
    assert!(matches!(gone, Err(StudyError::NotFound(_))));

    // earned points and badges are history, not bound to the content
    assert_eq!(engine.user(user_id).await?.points, 20);

    Ok(())
}

#[tokio::test]
async fn test_purge_single_topic_leaves_diploma() -> Result<()> {
    let (engine, store) = setup().await;
    let user_id = seed_student(&store, "topico@example.com").await?;
    let (diploma_id, topics) = seed_tree(&store, 2).await?;

    engine.save_bookmark(user_id, topics[0], "art-9").await?;

    let report = engine.purge_law(topics[0]).await?;
    assert_eq!(report.laws, 1);
    assert_eq!(report.progress_rows, 1);

    assert!(matches!(
        engine.view_topic(user_id, diploma_id).await?,
        ViewOutcome::Diploma { .. }
    ));
    assert!(matches!(
        engine.view_topic(user_id, topics[1]).await?,
        ViewOutcome::Topic(_)
    ));

    let missing = engine.purge_law(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StudyError::NotFound(_))));

    Ok(())
}
