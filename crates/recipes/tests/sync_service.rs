use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use recipe_box_identity::{IdentityResolver, IdentityState, InMemoryIdentity};
use recipe_box_recipes::{
    Difficulty, IdentitySubscription, InMemoryRecipeStore, RecipeDraft, RecipeId, RecipeRow,
    RecipeService, RecipeSync, RecipeSyncBuilder, StoreErrorKind, StoreOp, SyncError,
    SyncEvent, SyncPolicy, UserId, VisibilityMode,
};

fn row(id: &str, owner: &str, day: u32, is_public: bool) -> RecipeRow {
    RecipeRow {
        id: RecipeId::from(id),
        owner_id: UserId::from(owner),
        title: format!("Recipe {id}"),
        description: "weeknight dinner".into(),
        image: "https://img.example/plate.jpg".into(),
        ingredients: vec!["rice".into(), "beans".into()],
        steps: vec!["cook rice".into(), "warm beans".into()],
        cook_time: 30,
        difficulty: Difficulty::Easy,
        author: owner.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        is_public,
    }
}

fn draft(title: &str) -> RecipeDraft {
    RecipeDraft {
        title: title.into(),
        description: "from the test kitchen".into(),
        image: "https://img.example/new.jpg".into(),
        ingredients: vec!["flour".into(), "water".into(), "salt".into()],
        steps: vec!["knead".into(), "rest".into(), "bake".into()],
        cook_time: 45,
        difficulty: Difficulty::Hard,
        author: "Tester".into(),
        is_public: true,
    }
}

fn scenario_store() -> Arc<InMemoryRecipeStore> {
    InMemoryRecipeStore::with_rows(vec![row("r1", "u1", 1, true), row("r2", "u2", 2, true)])
}

async fn signed_in(store: &Arc<InMemoryRecipeStore>, user: &str) -> Arc<RecipeSync> {
    let sync = RecipeSyncBuilder::new(store.clone()).build();
    sync.on_identity(IdentityState::signed_in(user)).await;
    sync
}

fn ids(sync: &RecipeSync) -> Vec<String> {
    sync.recipes()
        .iter()
        .map(|recipe| recipe.id.to_string())
        .collect()
}

#[tokio::test]
async fn load_orders_newest_first_and_derives_ownership() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;

    let recipes = sync.recipes();
    assert_eq!(ids(&sync), vec!["r2", "r1"]);
    assert!(!recipes[0].is_owner);
    assert!(recipes[1].is_owner);
    assert!(!sync.loading());
}

#[tokio::test]
async fn starts_loading_until_identity_resolves() {
    let store = scenario_store();
    let sync = RecipeSyncBuilder::new(store.clone()).build();
    assert!(sync.loading());

    sync.on_identity(IdentityState::unresolved()).await;
    assert!(sync.loading());
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn sign_out_clears_state_without_store_calls() {
    let store = scenario_store();
    store.seed_saved(&UserId::from("u1"), &RecipeId::from("r2"));
    let sync = signed_in(&store, "u1").await;
    assert_eq!(sync.recipes().len(), 2);
    assert!(sync.is_saved(&RecipeId::from("r2")));

    store.reset_calls();
    sync.on_identity(IdentityState::anonymous()).await;

    assert!(sync.recipes().is_empty());
    assert!(sync.saved_recipe_ids().is_empty());
    assert!(!sync.loading());
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn repeated_identity_does_not_reload() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    store.reset_calls();

    sync.on_identity(IdentityState::signed_in("u1")).await;
    assert_eq!(store.call_count(), 0);
    assert_eq!(sync.status().skipped_reloads, 1);
}

#[tokio::test]
async fn failed_recipe_load_keeps_previous_list_and_stops_loading() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    store.seed_row(row("r3", "u1", 3, true));

    store.fail(StoreOp::ListRecipes, StoreErrorKind::Unavailable("timeout".into()));
    let err = sync.load().await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(ids(&sync), vec!["r2", "r1"]);

    store.recover(StoreOp::ListRecipes);
    assert_eq!(sync.load().await.unwrap(), 3);
    assert_eq!(ids(&sync), vec!["r3", "r2", "r1"]);
}

#[tokio::test]
async fn reload_settles_loading_even_when_a_fetch_fails() {
    let store = scenario_store();
    store.fail(StoreOp::ListSaved, StoreErrorKind::Unauthorized("expired".into()));
    let sync = signed_in(&store, "u1").await;

    assert!(!sync.loading());
    assert_eq!(sync.recipes().len(), 2);
    assert!(sync.saved_recipe_ids().is_empty());
    assert_eq!(sync.status().store_failures, 1);
}

#[tokio::test]
async fn failed_saved_load_keeps_previous_set() {
    let store = scenario_store();
    let u1 = UserId::from("u1");
    store.seed_saved(&u1, &RecipeId::from("r1"));
    let sync = signed_in(&store, "u1").await;

    store.seed_saved(&u1, &RecipeId::from("r2"));
    store.fail_once(StoreOp::ListSaved, StoreErrorKind::Unavailable("503".into()));
    assert!(sync.load_saved().await.is_err());
    assert_eq!(
        sync.saved_recipe_ids(),
        HashSet::from([RecipeId::from("r1")])
    );

    assert_eq!(sync.load_saved().await.unwrap(), 2);
}

#[tokio::test]
async fn toggle_twice_restores_membership() {
    let store = scenario_store();
    let u1 = UserId::from("u1");
    let r1 = RecipeId::from("r1");
    store.seed_saved(&u1, &r1);
    let sync = signed_in(&store, "u1").await;
    assert_eq!(sync.saved_recipe_ids(), HashSet::from([r1.clone()]));

    assert!(!sync.toggle_saved(&r1).await.unwrap());
    assert!(sync.saved_recipe_ids().is_empty());
    assert!(store.saved_for(&u1).is_empty());

    assert!(sync.toggle_saved(&r1).await.unwrap());
    assert_eq!(sync.saved_recipe_ids(), HashSet::from([r1.clone()]));
    assert_eq!(store.saved_for(&u1), HashSet::from([r1]));
}

#[tokio::test]
async fn serial_toggles_follow_parity() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let r2 = RecipeId::from("r2");

    for count in 1..=7 {
        sync.toggle_saved(&r2).await.unwrap();
        assert_eq!(sync.is_saved(&r2), count % 2 == 1);
    }
    assert!(sync.is_saved(&r2));
    assert!(store.saved_for(&UserId::from("u1")).contains(&r2));
}

#[tokio::test]
async fn failed_toggle_leaves_membership_unchanged() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let r1 = RecipeId::from("r1");

    store.fail_once(StoreOp::InsertSaved, StoreErrorKind::Constraint("fk".into()));
    let err = sync.toggle_saved(&r1).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert!(!sync.is_saved(&r1));

    assert!(sync.toggle_saved(&r1).await.unwrap());
    store.fail_once(StoreOp::DeleteSaved, StoreErrorKind::Unavailable("down".into()));
    assert!(sync.toggle_saved(&r1).await.is_err());
    assert!(sync.is_saved(&r1));
}

#[tokio::test]
async fn mutations_require_identity() {
    let store = scenario_store();
    let sync = RecipeSyncBuilder::new(store.clone()).build();
    sync.on_identity(IdentityState::anonymous()).await;

    let r1 = RecipeId::from("r1");
    assert_eq!(sync.toggle_saved(&r1).await, Err(SyncError::NotAuthenticated));
    assert_eq!(
        sync.set_saved(&r1, true).await,
        Err(SyncError::NotAuthenticated)
    );
    assert_eq!(
        sync.add_recipe(draft("Bread")).await.unwrap_err(),
        SyncError::NotAuthenticated
    );
    assert_eq!(sync.load().await, Ok(0));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn set_saved_is_idempotent() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let r2 = RecipeId::from("r2");

    assert!(sync.set_saved(&r2, true).await.unwrap());
    assert!(sync.set_saved(&r2, true).await.unwrap());
    assert!(sync.is_saved(&r2));
    assert_eq!(store.saved_for(&UserId::from("u1")).len(), 1);

    assert!(!sync.set_saved(&r2, false).await.unwrap());
    assert!(!sync.set_saved(&r2, false).await.unwrap());
    assert!(!sync.is_saved(&r2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_on_one_recipe_are_serialized() {
    let store = scenario_store();
    store.set_delay(StoreOp::InsertSaved, Duration::from_millis(20));
    store.set_delay(StoreOp::DeleteSaved, Duration::from_millis(20));
    let sync = signed_in(&store, "u1").await;
    let r1 = RecipeId::from("r1");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let sync = sync.clone();
        let r1 = r1.clone();
        handles.push(tokio::spawn(async move { sync.toggle_saved(&r1).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(!sync.is_saved(&r1));
    assert_eq!(store.calls_of(StoreOp::InsertSaved), 2);
    assert_eq!(store.calls_of(StoreOp::DeleteSaved), 2);
    assert!(store.saved_for(&UserId::from("u1")).is_empty());
}

#[tokio::test]
async fn add_recipe_prepends_owned_recipe() {
    let store = scenario_store();
    let sync = signed_in(&store, "u2").await;
    let before: Vec<_> = sync.recipes().into_iter().map(|r| r.id).collect();

    let added = sync.add_recipe(draft("Sourdough")).await.unwrap();

    let recipes = sync.recipes();
    assert_eq!(recipes.len(), 3);
    assert_eq!(recipes[0], added);
    assert!(recipes[0].is_owner);
    assert!(!before.contains(&added.id));
    assert_eq!(added.ingredients, vec!["flour", "water", "salt"]);
    assert_eq!(store.rows().len(), 3);
}

#[tokio::test]
async fn failed_add_leaves_recipes_untouched() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let before = sync.recipes();

    store.fail_once(StoreOp::InsertRecipe, StoreErrorKind::Unavailable("offline".into()));
    let err = sync.add_recipe(draft("Focaccia")).await.unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(sync.recipes(), before);
}

#[tokio::test]
async fn invalid_draft_is_rejected_before_the_store() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    store.reset_calls();

    let mut bad = draft("   ");
    assert!(matches!(
        sync.add_recipe(bad.clone()).await,
        Err(SyncError::InvalidDraft(_))
    ));
    bad.title = "Zero".into();
    bad.cook_time = 0;
    assert!(matches!(
        sync.update_recipe(&RecipeId::from("r1"), bad).await,
        Err(SyncError::InvalidDraft(_))
    ));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn update_patches_fields_and_keeps_identity() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let r1 = RecipeId::from("r1");
    let original = sync.recipe(&r1).unwrap();

    let mut changes = draft("Better beans");
    changes.is_public = false;
    sync.update_recipe(&r1, changes.clone()).await.unwrap();

    let updated = sync.recipe(&r1).unwrap();
    assert_eq!(updated.to_draft(), changes);
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.is_owner);
    assert_eq!(ids(&sync), vec!["r2", "r1"]);

    let stored = store.rows().into_iter().find(|row| row.id == r1).unwrap();
    assert_eq!(stored.title, "Better beans");
    assert_eq!(stored.owner_id, UserId::from("u1"));
}

#[tokio::test]
async fn failed_update_is_reported_and_local_state_kept() {
    let store = scenario_store();
    let sync = signed_in(&store, "u1").await;
    let r1 = RecipeId::from("r1");
    let before = sync.recipe(&r1).unwrap();

    store.fail_once(StoreOp::UpdateRecipe, StoreErrorKind::Unauthorized("rls".into()));
    assert!(sync.update_recipe(&r1, draft("Nope")).await.is_err());
    assert_eq!(sync.recipe(&r1).unwrap(), before);

    let missing = sync
        .update_recipe(&RecipeId::from("ghost"), draft("Ghost"))
        .await
        .unwrap_err();
    assert_eq!(
        missing,
        SyncError::from(StoreErrorKind::NotFound)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn superseded_load_is_discarded() {
    let store = InMemoryRecipeStore::with_rows(vec![
        row("r1", "u1", 1, true),
        row("r2", "u2", 2, true),
    ]);
    store.seed_saved(&UserId::from("u1"), &RecipeId::from("r1"));
    store.seed_saved(&UserId::from("u2"), &RecipeId::from("r2"));
    let sync = RecipeSyncBuilder::new(store.clone()).build();

    store.set_delay(StoreOp::ListRecipes, Duration::from_millis(150));
    let slow = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.on_identity(IdentityState::signed_in("u1")).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    store.set_delay(StoreOp::ListRecipes, Duration::ZERO);

    sync.on_identity(IdentityState::signed_in("u2")).await;
    assert!(!sync.loading());
    slow.await.unwrap();

    assert_eq!(sync.identity(), Some(UserId::from("u2")));
    let recipes = sync.recipes();
    assert_eq!(ids(&sync), vec!["r2", "r1"]);
    assert!(recipes[0].is_owner);
    assert!(!recipes[1].is_owner);
    assert_eq!(
        sync.saved_recipe_ids(),
        HashSet::from([RecipeId::from("r2")])
    );
    assert!(!sync.loading());
    assert!(sync.status().stale_discards >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unresolved_identity_discards_inflight_load() {
    let store = scenario_store();
    let sync = RecipeSyncBuilder::new(store.clone()).build();

    let ticket = sync
        .accept_identity(IdentityState::signed_in("u1"))
        .expect("first identity reloads");
    assert_eq!(ticket.user(), &UserId::from("u1"));
    assert_eq!(ticket.generation(), sync.status().generation);

    store.set_delay(StoreOp::ListRecipes, Duration::from_millis(150));
    let inflight = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.reload(ticket).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    store.set_delay(StoreOp::ListRecipes, Duration::ZERO);

    assert!(sync.accept_identity(IdentityState::unresolved()).is_none());
    inflight.await.unwrap();

    assert!(sync.loading());
    assert!(sync.recipes().is_empty());
    assert!(sync.status().stale_discards >= 1);

    let again = sync
        .accept_identity(IdentityState::signed_in("u1"))
        .expect("same user reloads after an unresolved gap");
    assert!(again.generation() > 1);
    sync.reload(again).await;
    assert!(!sync.loading());
    assert_eq!(ids(&sync), vec!["r2", "r1"]);
}

#[tokio::test]
async fn switching_accounts_drops_previous_rows_on_failure() {
    let store = scenario_store();
    store.seed_saved(&UserId::from("u1"), &RecipeId::from("r1"));
    let sync = signed_in(&store, "u1").await;
    assert!(!sync.saved_recipe_ids().is_empty());

    store.fail(StoreOp::ListRecipes, StoreErrorKind::Unavailable("down".into()));
    store.fail(StoreOp::ListSaved, StoreErrorKind::Unavailable("down".into()));
    sync.on_identity(IdentityState::signed_in("u2")).await;

    assert!(sync.recipes().is_empty());
    assert!(sync.saved_recipe_ids().is_empty());
    assert!(!sync.loading());
}

#[tokio::test]
async fn public_and_own_visibility_hides_foreign_private_recipes() {
    let store = InMemoryRecipeStore::with_rows(vec![
        row("r1", "u1", 1, false),
        row("r2", "u2", 2, false),
        row("r3", "u2", 3, true),
    ]);
    let sync = RecipeSyncBuilder::new(store.clone())
        .with_policy(SyncPolicy {
            visibility: VisibilityMode::PublicAndOwn,
            ..SyncPolicy::default()
        })
        .build();
    sync.on_identity(IdentityState::signed_in("u1")).await;

    assert_eq!(ids(&sync), vec!["r3", "r1"]);
}

#[tokio::test]
async fn events_follow_state_changes() {
    let store = scenario_store();
    let sync = RecipeSyncBuilder::new(store.clone()).build();
    let mut events = sync.subscribe();

    sync.on_identity(IdentityState::signed_in("u1")).await;
    assert_eq!(
        events.recv().await.unwrap(),
        SyncEvent::Reloaded {
            identity: UserId::from("u1"),
            recipes: 2,
            saved: 0,
        }
    );

    let r2 = RecipeId::from("r2");
    sync.toggle_saved(&r2).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        SyncEvent::SavedChanged {
            recipe: r2,
            saved: true,
        }
    );

    let added = sync.add_recipe(draft("Pho")).await.unwrap();
    assert_eq!(events.recv().await.unwrap(), SyncEvent::RecipeAdded(added.id));

    sync.on_identity(IdentityState::anonymous()).await;
    assert_eq!(events.recv().await.unwrap(), SyncEvent::Cleared);
}

#[tokio::test]
async fn subscription_follows_the_resolver() {
    let store = scenario_store();
    let identity = InMemoryIdentity::new();
    let sync = RecipeSyncBuilder::new(store.clone()).build();
    let mut events = sync.subscribe();
    let subscription = IdentitySubscription::attach(sync.clone(), identity.clone());

    identity.sign_in("u1");
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SyncEvent::Reloaded { .. }));
    assert_eq!(sync.recipes().len(), 2);
    assert!(subscription.is_active());

    identity.sign_out();
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, SyncEvent::Cleared);
    assert!(sync.recipes().is_empty());

    drop(subscription);
    store.reset_calls();
    identity.sign_in("u2");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.call_count(), 0);
    assert_eq!(identity.current(), IdentityState::signed_in("u2"));
}
