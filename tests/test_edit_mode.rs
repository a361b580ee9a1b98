//! Integration tests for editing an existing project: every child action
//! goes straight to the server.

mod common;

use common::*;

async fn open_existing(
    backend: &FakeBackend,
) -> anyhow::Result<(ProjectWizard<FakeBackend>, String)> {
    let project_id = backend.seed_project("Harbor View", &["https://cdn.test/cover.jpg"]);
    let mut wizard = new_wizard(backend);
    wizard.open(Some(&project_id)).await?;
    Ok((wizard, project_id))
}

#[tokio::test]
async fn test_open_fetches_project_live() -> anyhow::Result<()> {
    let backend = FakeBackend::new();
    let (wizard, project_id) = open_existing(&backend).await?;

    assert_eq!(
        backend.calls(),
        vec![
            Call::GetProject(project_id.clone()),
            Call::ListBlocks(project_id.clone())
        ]
    );
    let session = wizard.session().expect("open");
    assert!(session.is_editing());
    assert_eq!(session.staging().project_id(), Some(project_id.as_str()));
    assert_eq!(session.project().fields.name, "Harbor View");
    assert_eq!(
        session.project().images,
        vec![ImageRef::Persisted("https://cdn.test/cover.jpg".to_string())]
    );

    Ok(())
}

#[tokio::test]
async fn test_child_actions_hit_server_immediately() -> anyhow::Result<()> {
    let backend = FakeBackend::new().with_unit("u1", None);
    let (mut wizard, project_id) = open_existing(&backend).await?;

    let phase = wizard.add_phase("Phase 1", None).await?;
    let phase_id = match &phase {
        PhaseKey::Persisted(id) => id.clone(),
        other => panic!("expected a server phase, got {:?}", other),
    };
    assert_eq!(backend.count(|c| matches!(c, Call::AddPhase(..))), 1);

    let block = wizard.add_block("Tower A", Some(&phase)).await?;
    assert!(matches!(block, BlockKey::Persisted(_)));
    let created = backend
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreateBlock(block) => Some(block),
            _ => None,
        })
        .expect("block created");
    assert_eq!(created.project, project_id);
    assert_eq!(created.phase.as_deref(), Some(phase_id.as_str()));

    wizard.enter_unit_step().await?;
    wizard.stage_unit("u1").await?;
    assert_eq!(
        backend.count(|c| matches!(c, Call::AssignUnit(id, Some(p)) if id == "u1" && p == &project_id)),
        1
    );

    let session = wizard.session().expect("open");
    match session.staging() {
        Staging::Live(live) => {
            assert_eq!(live.phases().len(), 1);
            assert_eq!(live.blocks().len(), 1);
            assert_eq!(live.units(), ["u1".to_string()]);
        }
        other => panic!("expected live staging, got {:?}", other),
    }

    // Removing goes to the server too
    wizard.remove_block(&block).await?;
    wizard.unstage_unit("u1").await?;
    wizard.remove_phase(&phase).await?;
    assert_eq!(backend.count(|c| matches!(c, Call::DeleteBlock(_))), 1);
    assert_eq!(
        backend.count(|c| matches!(c, Call::AssignUnit(id, None) if id == "u1")),
        1
    );
    assert_eq!(backend.count(|c| matches!(c, Call::RemovePhase(..))), 1);
    assert!(backend.state().units[0].is_unassigned());

    Ok(())
}

#[tokio::test]
async fn test_unit_step_takes_server_links() -> anyhow::Result<()> {
    let backend = FakeBackend::new();
    let (mut wizard, project_id) = open_existing(&backend).await?;
    let backend = backend
        .with_unit("u1", Some(project_id.as_str()))
        .with_unit("u2", None)
        .with_unit("u3", Some("elsewhere"));

    let availability = wizard.enter_unit_step().await?;
    let offered: Vec<&str> = availability.available.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(offered, vec!["u1", "u2"]);
    assert_eq!(availability.currently_assigned, vec!["u1"]);
    assert_eq!(
        wizard.session().expect("open").staging().staged_units(),
        ["u1".to_string()]
    );

    // The link is removed behind the wizard's back; re-entering overwrites
    backend.state().units[0].project = None;
    let availability = wizard.enter_unit_step().await?;
    assert!(availability.currently_assigned.is_empty());
    assert!(wizard.session().expect("open").staging().staged_units().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_malformed_phase_is_dropped_in_edit_mode() -> anyhow::Result<()> {
    let backend = FakeBackend::new();
    backend.state().phase_id_override = Some("legacy-phase".to_string());
    let (mut wizard, _) = open_existing(&backend).await?;

    let phase = wizard.add_phase("Old Phase", None).await?;
    assert_eq!(phase, PhaseKey::Persisted("legacy-phase".to_string()));
    wizard.add_block("Tower", Some(&phase)).await?;

    let block = backend
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreateBlock(block) => Some(block),
            _ => None,
        })
        .expect("block created");
    assert_eq!(block.phase, None);

    Ok(())
}

#[tokio::test]
async fn test_draft_keys_are_rejected_in_edit_mode() -> anyhow::Result<()> {
    let backend = FakeBackend::new();

    // Grab a draft phase key from a create-mode session
    let mut draft_wizard = new_wizard(&backend);
    draft_wizard.open(None).await?;
    let draft_phase = draft_wizard.add_phase("A", None).await?;

    let (mut wizard, _) = open_existing(&backend).await?;
    let err = wizard.add_block("B", Some(&draft_phase)).await.unwrap_err();
    assert!(matches!(err, StagingError::WrongPhaseKind(_)), "got {:?}", err);
    assert_eq!(backend.count(|c| matches!(c, Call::CreateBlock(_))), 0);

    Ok(())
}

#[tokio::test]
async fn test_commit_only_updates() -> anyhow::Result<()> {
    let backend = FakeBackend::new();
    let (mut wizard, project_id) = open_existing(&backend).await?;
    let mut refresh = wizard.refresh_signal().subscribe();

    wizard.stage_project(ProjectPatch {
        description: Some("Sea-facing towers".to_string()),
        ..Default::default()
    })?;
    let outcome = wizard.commit().await?;

    let project = match outcome {
        CommitOutcome::Updated(project) => project,
        other => panic!("expected an update, got {:?}", other),
    };
    assert_eq!(project.fields.name, "Harbor View");
    assert_eq!(project.fields.description, "Sea-facing towers");

    let writes: Vec<Call> = backend
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::GetProject(_) | Call::ListBlocks(_)))
        .collect();
    assert_eq!(writes.len(), 1);
    match &writes[0] {
        Call::UpdateProject(id, payload) => {
            assert_eq!(id, &project_id);
            assert_eq!(payload.images, vec!["https://cdn.test/cover.jpg"]);
        }
        other => panic!("expected an update call, got {:?}", other),
    }

    assert!(!wizard.is_open());
    assert!(refresh.has_changed()?);

    Ok(())
}

#[tokio::test]
async fn test_block_key_of_wrong_mode_is_rejected() -> anyhow::Result<()> {
    let backend = FakeBackend::new();

    let mut draft_wizard = new_wizard(&backend);
    draft_wizard.open(None).await?;
    let draft_block = draft_wizard.add_block("Staged", None).await?;

    let (mut wizard, _) = open_existing(&backend).await?;
    let err = wizard.remove_block(&draft_block).await.unwrap_err();
    assert!(matches!(err, StagingError::WrongBlockKind(_)), "got {:?}", err);
    assert_eq!(backend.count(|c| matches!(c, Call::DeleteBlock(_))), 0);

    // And the other way round
    let err = draft_wizard
        .remove_block(&BlockKey::Persisted("65a1f0c2e4b0a1b2c3d4e5f6".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::WrongBlockKind(_)), "got {:?}", err);

    Ok(())
}
