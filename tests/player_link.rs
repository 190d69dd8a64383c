mod common;

use std::sync::Arc;

use common::{Faulty, basic, fast_options, service, session};
use playerparent_onboarding::error::OnboardingError;
use playerparent_onboarding::onboarding::intent::IntentCache;
use playerparent_onboarding::onboarding::{OnboardingService, ServiceOptions};
use playerparent_onboarding::onboarding::models::{
    AccountType, LinkPlayer, PlayerSeed, ProfilePatch, Role, RoleChoice, UserId,
};
use playerparent_onboarding::onboarding::sequencer::{Step, Transition};
use playerparent_onboarding::session::Session;
use playerparent_onboarding::store::{MemoryStore, ProfileStore};

async fn parent(svc: &OnboardingService, id: &str) -> Session {
    let me = session(id);
    svc.submit_basic_info(Some(&me), &basic(id)).await.unwrap();
    svc.select_role(Some(&me), &RoleChoice { role: AccountType::Parent })
        .await
        .unwrap();
    me
}

async fn seed_player(store: &dyn ProfileStore, id: &str, username: &str, name: &str) -> UserId {
    let user = UserId(id.into());
    store
        .upsert_profile(
            &user,
            &ProfilePatch {
                role: Some(Role::Player),
                username: Some(username.into()),
                full_name: Some(name.into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    user
}

#[tokio::test]
async fn create_with_missing_association_is_critical_but_advances() {
    let store = Arc::new(Faulty::default());
    let svc = service(store.clone());
    let mom = parent(&svc, "mom-1").await;

    Faulty::set(&store.hide_links, true);
    let out = svc
        .create_player(Some(&mom), &PlayerSeed::default())
        .await
        .unwrap();

    assert_eq!(svc.consistency_failures(), 1);
    assert_eq!(out.transition, Transition::to_step(Step::new(5).unwrap()));
    assert_eq!(out.player.unwrap().role, Role::Player);
}

#[tokio::test]
async fn create_player_uses_a_given_username_or_a_placeholder() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let dad = parent(&svc, "dad-1").await;

    let named = svc
        .create_player(
            Some(&dad),
            &PlayerSeed {
                username: Some("Jr Star".into()),
                graduation_year: Some(2028),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .player
        .unwrap();
    assert_eq!(named.username.as_deref(), Some("jr-star"));
    assert_eq!(named.graduation_year, Some(2028));

    let err = svc
        .create_player(
            Some(&dad),
            &PlayerSeed {
                username: Some("jr-star".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::UsernameTaken));

    // sequential creates are not deduplicated
    svc.create_player(Some(&dad), &PlayerSeed::default()).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.players, 2);
    assert_eq!(stats.parent_links, 2);
    assert_eq!(svc.consistency_failures(), 0);
}

#[tokio::test]
async fn concurrent_creates_from_one_parent_are_rejected() {
    let store = Arc::new(Faulty::default());
    let svc = service(store.clone());
    let mom = parent(&svc, "mom-2").await;
    Faulty::set(&store.slow_create, true);

    let seed = PlayerSeed::default();
    let (first, second) = tokio::join!(
        svc.create_player(Some(&mom), &seed),
        svc.create_player(Some(&mom), &seed)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(OnboardingError::Busy)));

    // the guard is released afterwards
    svc.create_player(Some(&mom), &seed).await.unwrap();
}

#[tokio::test]
async fn linking_an_existing_player() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let kid = seed_player(store.as_ref(), "kid-1", "kidone", "Kid One").await;
    let mom = parent(&svc, "mom-3").await;
    let dad = parent(&svc, "dad-3").await;

    let out = svc
        .link_player(Some(&mom), &LinkPlayer { player_id: kid.clone() })
        .await
        .unwrap();
    assert_eq!(out.transition, Transition::to_step(Step::new(5).unwrap()));
    assert_eq!(out.player.unwrap().user_id, kid);

    // same parent again is a no-op
    svc.link_player(Some(&mom), &LinkPlayer { player_id: kid.clone() })
        .await
        .unwrap();
    assert_eq!(store.stats().await.unwrap().parent_links, 1);

    let err = svc
        .link_player(Some(&dad), &LinkPlayer { player_id: kid })
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::AlreadyLinked));
    assert_eq!(
        err.to_string(),
        "this player is already linked to another parent account"
    );
}

#[tokio::test]
async fn only_parents_link_and_only_players_are_linked() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let kid = seed_player(store.as_ref(), "kid-2", "kidtwo", "Kid Two").await;

    let player = session("p-self");
    svc.submit_basic_info(Some(&player), &basic("selfie")).await.unwrap();
    svc.select_role(Some(&player), &RoleChoice { role: AccountType::Player })
        .await
        .unwrap();
    let err = svc
        .link_player(Some(&player), &LinkPlayer { player_id: kid })
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::Forbidden(_)));

    let mom = parent(&svc, "mom-4").await;
    let err = svc
        .link_player(
            Some(&mom),
            &LinkPlayer {
                player_id: UserId("dad-nobody".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::NotFound("player")));

    // a parent is not a linkable player
    let err = svc
        .link_player(Some(&mom), &LinkPlayer { player_id: mom.user_id.clone() })
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::NotFound("player")));
}

#[tokio::test]
async fn search_ranks_closest_matches_first() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    seed_player(store.as_ref(), "k1", "smithers", "Waylon Smithers").await;
    seed_player(store.as_ref(), "k2", "smith", "Jordan Smith").await;
    seed_player(store.as_ref(), "k3", "other", "Nobody Here").await;
    let mom = parent(&svc, "mom-5").await;

    assert!(svc.search_players(Some(&mom), "s").await.unwrap().is_empty());

    let hits = svc.search_players(Some(&mom), "SMITH").await.unwrap();
    let names: Vec<_> = hits.iter().filter_map(|p| p.username.as_deref()).collect();
    assert_eq!(names, ["smith", "smithers"]);
}

#[tokio::test]
async fn best_match_survives_a_small_result_limit() {
    let store = Arc::new(MemoryStore::new());
    let svc = OnboardingService::new(
        store.clone(),
        Arc::new(IntentCache::default()),
        ServiceOptions {
            search_limit: 2,
            ..fast_options()
        },
    );
    // all of these sort ahead of the exact match by username
    seed_player(store.as_ref(), "k1", "asmithx", "Alex Avery").await;
    seed_player(store.as_ref(), "k2", "bsmithy", "Bo Brown").await;
    seed_player(store.as_ref(), "k3", "csmithz", "Cy Cole").await;
    seed_player(store.as_ref(), "k4", "smith", "Jordan Smith").await;
    let mom = parent(&svc, "mom-6").await;

    let hits = svc.search_players(Some(&mom), "smith").await.unwrap();
    let names: Vec<_> = hits.iter().filter_map(|p| p.username.as_deref()).collect();
    assert_eq!(names, ["smith", "asmithx"]);
}
