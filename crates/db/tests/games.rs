mod common;

use std::collections::HashSet;

use chrono_tz::Tz;
use common::{RecordingViews, at, count_games, court, game, new_game, now, setup, user};
use courtside_models::{Error, GameFilter, GameSort, NoViews, ViewKey};

#[tokio::test]
async fn organizer_is_first_participant() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;
    let views = RecordingViews::default();

    let mut input = new_game(rucker.id, "2030-06-02", "18:30", 10);
    input.notes = Some("bring a dark shirt".into());
    let created = courtside_db::create_game(&pool, &views, ana.id, &input, Tz::UTC)
        .await
        .unwrap();

    assert_eq!(created.game.organizer_id, ana.id);
    assert_eq!(created.game.date, "2030-06-02");
    assert_eq!(created.game.start_time, "18:30");
    assert_eq!(created.game.status, "scheduled");
    assert_eq!(created.game.participant_count, 1);
    assert_eq!(created.participants.len(), 1);
    assert!(created.participants[0].is_organizer);
    assert_eq!(created.participants[0].user.id, ana.id);
    assert_eq!(created.court.name, "Rucker Park");
    assert_eq!(created.organizer.username, "ana");
    assert_eq!(
        views.keys(),
        vec![ViewKey::Dashboard, ViewKey::Profile(ana.id), ViewKey::Court(rucker.id)]
    );
}

#[tokio::test]
async fn impossible_date_persists_nothing() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;

    let input = new_game(rucker.id, "2024-02-30", "18:00", 10);
    let err = courtside_db::create_game(&pool, &NoViews, ana.id, &input, Tz::UTC)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(ref m) if m.starts_with("invalid date")));
    assert_eq!(count_games(&pool).await, 0);
}

#[tokio::test]
async fn malformed_start_time_and_missing_court() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;

    let input = new_game(rucker.id, "2030-06-02", "after work", 10);
    let err = courtside_db::create_game(&pool, &NoViews, ana.id, &input, Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.starts_with("invalid start time")));

    let input = new_game(9999, "2030-06-02", "18:00", 10);
    let err = courtside_db::create_game(&pool, &NoViews, ana.id, &input, Tz::UTC)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(count_games(&pool).await, 0);
}

#[tokio::test]
async fn iso_start_time_is_converted_to_server_zone() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;
    let tz: Tz = "America/New_York".parse().unwrap();

    let input = new_game(rucker.id, "2030-06-02", "2030-06-02T22:00:00Z", 10);
    let created = courtside_db::create_game(&pool, &NoViews, ana.id, &input, tz)
        .await
        .unwrap();

    assert_eq!(created.game.date, "2030-06-02");
    assert_eq!(created.game.start_time, "18:00");
}

#[tokio::test]
async fn missing_game_is_not_found() {
    let pool = setup().await;
    let err = courtside_db::get_game(&pool, 42).await.unwrap_err();
    assert_eq!(err.to_string(), "game 42 not found");
}

#[tokio::test]
async fn upcoming_excludes_same_day_games_already_started() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;
    let tomorrow = game(&pool, ana.id, rucker.id, "2030-06-02", "18:00", 10).await;
    let started = game(&pool, ana.id, rucker.id, "2030-06-01", "11:00", 10).await;
    let later_today = game(&pool, ana.id, rucker.id, "2030-06-01", "13:00", 10).await;
    let last_month = game(&pool, ana.id, rucker.id, "2030-05-01", "18:00", 10).await;

    let filter = GameFilter {
        upcoming: Some(true),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &filter, &now()).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|g| g.game.id).collect();
    assert_eq!(ids, vec![later_today.game.id, tomorrow.game.id]);
    assert_eq!(page.total, 2);

    let all = courtside_db::list_games(&pool, &GameFilter::default(), &now()).await.unwrap();
    let ids: Vec<_> = all.items.iter().map(|g| g.game.id).collect();
    assert_eq!(
        ids,
        vec![last_month.game.id, started.game.id, later_today.game.id, tomorrow.game.id]
    );
}

#[tokio::test]
async fn filters_combine() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let ben = user(&pool, "ben").await;
    let rucker = court(&pool, "Rucker Park").await;
    let venice = court(&pool, "Venice Beach").await;

    let mut beginner = new_game(rucker.id, "2030-06-03", "09:00", 4);
    beginner.skill_level = Some("beginner".into());
    let beginner = courtside_db::create_game(&pool, &NoViews, ana.id, &beginner, Tz::UTC)
        .await
        .unwrap();
    let mut advanced = new_game(venice.id, "2030-06-04", "09:00", 4);
    advanced.skill_level = Some("advanced".into());
    advanced.game_type = Some("basketball-3v3".into());
    let advanced = courtside_db::create_game(&pool, &NoViews, ben.id, &advanced, Tz::UTC)
        .await
        .unwrap();
    let solo = game(&pool, ben.id, rucker.id, "2030-06-05", "09:00", 1).await;

    let by_skill = GameFilter {
        skill_level: Some("beginner,advanced".into()),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &by_skill, &now()).await.unwrap();
    assert_eq!(page.total, 2);

    let by_court = GameFilter {
        court_id: Some(rucker.id),
        ..Default::default()
    };
    let ids: Vec<_> = courtside_db::list_games(&pool, &by_court, &now())
        .await
        .unwrap()
        .items
        .iter()
        .map(|g| g.game.id)
        .collect();
    assert_eq!(ids, vec![beginner.game.id, solo.game.id]);

    let by_organizer = GameFilter {
        organizer: Some("ben".into()),
        has_open_spots: Some(true),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &by_organizer, &now()).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|g| g.game.id).collect();
    assert_eq!(ids, vec![advanced.game.id]);

    let by_type_and_range = GameFilter {
        game_type: Some("basketball-5v5".into()),
        date_from: Some("2030-06-04".into()),
        date_to: Some("2030-06-05".into()),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &by_type_and_range, &now()).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|g| g.game.id).collect();
    assert_eq!(ids, vec![solo.game.id]);

    let bad_range = GameFilter {
        date_from: Some("2030-02-31".into()),
        ..Default::default()
    };
    let err = courtside_db::list_games(&pool, &bad_range, &now()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn pagination_and_recent_cap() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;
    for day in 1..=12 {
        game(&pool, ana.id, rucker.id, &format!("2030-05-{day:02}"), "18:00", 10).await;
    }

    let second_page = GameFilter {
        page: Some(2),
        limit: Some(5),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &second_page, &now()).await.unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(page.page, 2);
    let dates: Vec<_> = page.items.iter().map(|g| g.game.date.as_str()).collect();
    assert_eq!(dates, vec!["2030-05-06", "2030-05-07", "2030-05-08", "2030-05-09", "2030-05-10"]);

    let recent = GameFilter {
        sort: Some(GameSort::Recent),
        limit: Some(50),
        ..Default::default()
    };
    let page = courtside_db::list_games(&pool, &recent, &now()).await.unwrap();
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0].game.date, "2030-05-12");
    assert_eq!(page.items[9].game.date, "2030-05-03");
}

#[tokio::test]
async fn user_games_split_is_disjoint_and_exhaustive() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let ben = user(&pool, "ben").await;
    let rucker = court(&pool, "Rucker Park").await;

    let organized_future = game(&pool, ana.id, rucker.id, "2030-06-02", "18:00", 10).await;
    let organized_past = game(&pool, ana.id, rucker.id, "2030-05-20", "18:00", 10).await;
    let later_today = game(&pool, ben.id, rucker.id, "2030-06-01", "12:30", 10).await;
    courtside_db::join_game(&pool, &NoViews, later_today.game.id, ana.id, &now())
        .await
        .unwrap();
    let not_involved = game(&pool, ben.id, rucker.id, "2030-06-03", "18:00", 10).await;

    let split = courtside_db::user_games(&pool, ana.id, &now()).await.unwrap();
    let upcoming: Vec<_> = split.upcoming.iter().map(|g| g.game.id).collect();
    let history: Vec<_> = split.history.iter().map(|g| g.game.id).collect();
    assert_eq!(upcoming, vec![later_today.game.id, organized_future.game.id]);
    assert_eq!(history, vec![organized_past.game.id]);

    // Half an hour later the same-day game has moved to history on its own.
    let split = courtside_db::user_games(&pool, ana.id, &at("2030-06-01", 12, 30))
        .await
        .unwrap();
    let upcoming: HashSet<_> = split.upcoming.iter().map(|g| g.game.id).collect();
    let history: HashSet<_> = split.history.iter().map(|g| g.game.id).collect();
    assert!(upcoming.is_disjoint(&history));
    assert_eq!(upcoming, HashSet::from([organized_future.game.id]));
    assert_eq!(history, HashSet::from([later_today.game.id, organized_past.game.id]));
    assert!(!upcoming.contains(&not_involved.game.id));
    assert!(!history.contains(&not_involved.game.id));
}

#[tokio::test]
async fn history_is_capped_most_recent_first() {
    let pool = setup().await;
    let ana = user(&pool, "ana").await;
    let rucker = court(&pool, "Rucker Park").await;
    for day in 1..=14 {
        game(&pool, ana.id, rucker.id, &format!("2030-05-{day:02}"), "18:00", 10).await;
    }

    let split = courtside_db::user_games(&pool, ana.id, &now()).await.unwrap();
    assert!(split.upcoming.is_empty());
    assert_eq!(split.history.len(), 10);
    assert_eq!(split.history[0].game.date, "2030-05-14");
}
