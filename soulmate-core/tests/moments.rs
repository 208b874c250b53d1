use std::time::Duration;

use soulmate_core::ai::mock::MockBehavior;
use soulmate_core::character::default_roster;
use soulmate_core::moments::FALLBACK_MOMENT;
use soulmate_core::{Character, MomentAuthor, MomentId, SessionError, SessionEvent};

mod fixture;

use fixture::{Fixture, COMMENT_PROMPT, MOMENT_PROMPT};

fn feed_fixture() -> Fixture {
    Fixture::with_routes(
        vec![
            MockBehavior::route(
                MOMENT_PROMPT,
                MockBehavior::reply("{\"content\": \"今天画了一整天的画 🎨\"}"),
            ),
            MockBehavior::route(COMMENT_PROMPT, MockBehavior::reply("谢谢你～")),
        ],
        MockBehavior::Success,
    )
}

fn comment_texts(fixture: &Fixture, id: &MomentId) -> Vec<(String, String)> {
    fixture
        .session
        .moment(id)
        .unwrap()
        .comments
        .into_iter()
        .map(|c| (c.author, c.content))
        .collect()
}

#[test]
fn test_like_toggles_round_trip() {
    fixture::run(|mut fixture| async move {
        let moment = fixture
            .session
            .create_moment(MomentAuthor::User, "今天的晚霞", None)
            .unwrap();

        assert_eq!(fixture.session.toggle_like(&moment.id, "我").unwrap(), ["我"]);
        assert!(fixture.session.toggle_like(&moment.id, "我").unwrap().is_empty());
        assert!(fixture.session.moment(&moment.id).unwrap().likes.is_empty());

        let updates = fixture
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::MomentUpdated(_)))
            .count();
        assert_eq!(updates, 2);
    });
}

#[test]
fn test_character_answers_comment_after_delay() {
    fixture::run_with(feed_fixture, |fixture| async move {
        let author = fixture.character_id();
        let moment = fixture
            .session
            .create_moment(MomentAuthor::Character(author), "晚霞真好看", None)
            .unwrap();

        let updated = fixture.session.add_comment(&moment.id, "我", "好美").unwrap();
        assert_eq!(updated.comments.len(), 1, "the comment shows up immediately");

        tokio::time::sleep(Duration::from_millis(1000)).await;
        fixture
            .session
            .add_comment(&moment.id, "我", "下次一起去看")
            .unwrap();
        assert_eq!(fixture.mock().get_call_count(), 0, "replies wait for the delay");

        fixture.session.wait_idle().await;

        assert_eq!(
            comment_texts(&fixture, &moment.id),
            vec![
                ("我".to_string(), "好美".to_string()),
                ("我".to_string(), "下次一起去看".to_string()),
                ("陈云川".to_string(), "谢谢你～".to_string()),
                ("陈云川".to_string(), "谢谢你～".to_string()),
            ]
        );

        let request = &fixture.mock().requests_matching(COMMENT_PROMPT)[0];
        let turn = request.messages[0].content.text();
        assert!(turn.contains("晚霞真好看"));
        assert!(turn.contains("好美"));
    });
}

#[test]
fn test_responder_does_not_answer_itself() {
    fixture::run_with(feed_fixture, |fixture| async move {
        let author = fixture.character_id();
        let moment = fixture
            .session
            .create_moment(MomentAuthor::Character(author), "晚霞真好看", None)
            .unwrap();

        fixture
            .session
            .add_comment(&moment.id, "陈云川", "自己评论一下")
            .unwrap();
        fixture.session.wait_idle().await;

        assert_eq!(comment_texts(&fixture, &moment.id).len(), 1);
        assert_eq!(fixture.mock().get_call_count(), 0);
    });
}

#[test]
fn test_reply_to_deleted_moment_is_dropped() {
    fixture::run_with(feed_fixture, |fixture| async move {
        let author = fixture.character_id();
        let moment = fixture
            .session
            .create_moment(MomentAuthor::Character(author), "晚霞真好看", None)
            .unwrap();
        fixture.session.add_comment(&moment.id, "我", "好美").unwrap();

        fixture.session.delete_moment(&moment.id).unwrap();
        fixture.session.wait_idle().await;

        assert!(fixture.session.moment(&moment.id).is_none());
        assert_eq!(fixture.mock().get_call_count(), 0);
    });
}

#[test]
fn test_user_post_gets_answer_from_some_character() {
    fixture::run_with(
        || {
            let mut roster = default_roster();
            roster.push(Character::new("阿青"));
            Fixture::with_roster_and_behavior(
                roster,
                MockBehavior::Routed {
                    routes: vec![MockBehavior::route(COMMENT_PROMPT, MockBehavior::reply("来了"))],
                    fallback: Box::new(MockBehavior::Success),
                },
            )
        },
        |fixture| async move {
            let moment = fixture
                .session
                .create_moment(MomentAuthor::User, "新买的相机", None)
                .unwrap();
            fixture
                .session
                .add_comment(&moment.id, "路人", "好看")
                .unwrap();
            fixture.session.wait_idle().await;

            let comments = comment_texts(&fixture, &moment.id);
            assert_eq!(comments.len(), 2);
            assert!(["陈云川", "阿青"].contains(&comments[1].0.as_str()));
            assert_eq!(comments[1].1, "来了");
        },
    );
}

#[test]
fn test_refresh_posts_generated_moment() {
    fixture::run_with(feed_fixture, |fixture| async move {
        let moment = fixture.session.refresh_moments().await.unwrap().unwrap();

        assert_eq!(moment.author, MomentAuthor::Character(fixture.character_id()));
        assert_eq!(moment.content, "今天画了一整天的画 🎨");
        assert_eq!(moment.images.len(), 1);
        assert_eq!(fixture.session.moments()[0].id, moment.id);
    });
}

#[test]
fn test_refresh_falls_back_when_generation_fails() {
    fixture::run_with(
        || Fixture::with_mock_behavior(MockBehavior::AlwaysNonRetryableError),
        |fixture| async move {
            let moment = fixture.session.refresh_moments().await.unwrap().unwrap();

            assert_eq!(moment.content, FALLBACK_MOMENT);
            assert!(moment.images.is_empty());
            assert_eq!(fixture.session.moments().len(), 1);
        },
    );
}

#[test]
fn test_refresh_with_empty_roster_posts_nothing() {
    fixture::run_with(
        || Fixture::with_roster_and_behavior(Vec::new(), MockBehavior::Success),
        |fixture| async move {
            assert!(fixture.session.refresh_moments().await.unwrap().is_none());
            assert!(fixture.session.moments().is_empty());
            assert_eq!(fixture.mock().get_call_count(), 0);
        },
    );
}

#[test]
fn test_invalid_moment_operations() {
    fixture::run(|fixture| async move {
        assert!(matches!(
            fixture.session.create_moment(MomentAuthor::User, "  ", None),
            Err(SessionError::EmptyInput)
        ));

        let missing = MomentId::from("missing");
        assert!(matches!(
            fixture.session.toggle_like(&missing, "我"),
            Err(SessionError::MomentNotFound(_))
        ));
        assert!(matches!(
            fixture.session.add_comment(&missing, "我", "hi"),
            Err(SessionError::MomentNotFound(_))
        ));
        assert!(matches!(
            fixture.session.delete_moment(&missing),
            Err(SessionError::MomentNotFound(_))
        ));

        let with_image = fixture
            .session
            .create_moment(
                MomentAuthor::User,
                "",
                Some("https://picsum.photos/seed/cat/300/300".to_string()),
            )
            .unwrap();
        assert_eq!(with_image.images.len(), 1);
    });
}
