mod common;

use common::{
    harness, postback, settings, text, Behavior, Blocking, Claimer, Counter, Quiz, Scripted, ADMIN,
};
use pagebot_core::dispatcher::{COMMAND_FAILED_NOTICE, MAINTENANCE_NOTICE, POSTBACK_FAILED_NOTICE};
use pagebot_core::handler::CommandSpec;
use pagebot_core::cooldown::MAX_COOLDOWN_SECS;
use pagebot_core::locks::LockKind;
use pagebot_core::registry::RouteTarget;
use pagebot_core::{DispatchOutcome, DropReason, InboundEvent, Rejection, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn rejection(outcome: DispatchOutcome) -> Rejection {
    match outcome {
        DispatchOutcome::Rejected(rejection) => rejection,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

fn command_ok(name: &str) -> DispatchOutcome {
    DispatchOutcome::Command {
        name: name.to_string(),
        success: true,
    }
}

#[tokio::test]
async fn prefixed_command_runs_and_plain_text_goes_to_events() {
    let (dispatcher, messenger) = harness(settings(), |_| {});

    assert_eq!(dispatcher.dispatch(text("1", "/getid")).await, command_ok("getid"));
    assert!(messenger
        .last_text_for("1")
        .is_some_and(|t| t.contains("Your User ID: 1")));

    // Without the prefix it is not a command; the welcome handler greets instead.
    let outcome = dispatcher.dispatch(text("1", "getid")).await;
    assert_eq!(outcome, DispatchOutcome::Events { ran: 1 });
    assert_eq!(messenger.messages_for("1").len(), 1);
}

#[tokio::test]
async fn no_prefix_command_typed_with_prefix_is_rejected() {
    let ai = Scripted::new(CommandSpec::new("ai", "chat").without_prefix(), Behavior::Succeed);
    let registered = Arc::clone(&ai);
    let (dispatcher, messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("ai");
    });

    let outcome = dispatcher.dispatch(text("1", "/ai hello")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(Rejection::PrefixNotRequired {
            command: "ai".into()
        })
    );
    assert!(messenger
        .last_text_for("1")
        .is_some_and(|t| t.contains("does not require a prefix")));

    assert_eq!(dispatcher.dispatch(text("1", "AI hello")).await, command_ok("ai"));
    assert_eq!(ai.runs(), 1);
}

#[tokio::test]
async fn admin_only_command_refuses_regular_users() {
    let (dispatcher, messenger) = harness(settings(), |_| {});

    let outcome = dispatcher.dispatch(text("1", "/status")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(Rejection::AdminOnly {
            command: "status".into()
        })
    );
    assert_eq!(
        messenger.last_text_for("1").as_deref(),
        Some("You do not have permission to use this command.")
    );

    assert_eq!(dispatcher.dispatch(text(ADMIN, "/status")).await, command_ok("status"));
    assert!(messenger
        .last_text_for(ADMIN)
        .is_some_and(|t| t.contains("Bot Status")));
}

#[tokio::test]
async fn maintenance_blocks_everyone_but_admins() {
    let mut cfg = settings();
    cfg.maintenance = true;
    let (dispatcher, messenger) = harness(cfg, |_| {});

    let outcome = dispatcher.dispatch(text("1", "/getid")).await;
    assert_eq!(outcome, DispatchOutcome::Rejected(Rejection::Maintenance));
    assert_eq!(messenger.last_text_for("1").as_deref(), Some(MAINTENANCE_NOTICE));

    // Postbacks are gated too.
    let outcome = dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await;
    assert_eq!(outcome, DispatchOutcome::Rejected(Rejection::Maintenance));

    // Receipts are refused without a notice.
    let mut read = text("2", "");
    read.message = None;
    read.read = Some(serde_json::json!({"watermark": 1}));
    assert_eq!(
        dispatcher.dispatch(read).await,
        DispatchOutcome::Rejected(Rejection::Maintenance)
    );
    assert!(messenger.texts_for("2").is_empty());

    assert_eq!(dispatcher.dispatch(text(ADMIN, "/getid")).await, command_ok("getid"));
}

#[tokio::test(start_paused = true)]
async fn command_cooldown_applies_to_users_but_not_admins() {
    let (dispatcher, messenger) = harness(settings(), |_| {});

    assert_eq!(dispatcher.dispatch(text("1", "/help")).await, command_ok("help"));
    let outcome = dispatcher.dispatch(text("1", "/help")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(Rejection::Cooldown {
            command: "help".into(),
            remaining_secs: 5
        })
    );
    assert_eq!(
        messenger.last_text_for("1").as_deref(),
        Some("Please wait 5 second(s) before using this command again.")
    );

    // Another user is unaffected.
    assert_eq!(dispatcher.dispatch(text("2", "/help")).await, command_ok("help"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(matches!(
        dispatcher.dispatch(text("1", "/help")).await,
        DispatchOutcome::Rejected(Rejection::Cooldown {
            remaining_secs: 3,
            ..
        })
    ));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(dispatcher.dispatch(text("1", "/help")).await, command_ok("help"));

    assert_eq!(dispatcher.dispatch(text(ADMIN, "/help")).await, command_ok("help"));
    assert_eq!(dispatcher.dispatch(text(ADMIN, "/help")).await, command_ok("help"));
}

#[tokio::test]
async fn second_command_waits_for_the_first() {
    let slow = Blocking::new("slow");
    let registered = Arc::clone(&slow);
    let (dispatcher, messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("slow");
    });

    let running = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(text("1", "/slow")).await })
    };
    slow.started.notified().await;

    let outcome = dispatcher.dispatch(text("1", "/getid")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(Rejection::CommandBusy {
            running: "slow".into()
        })
    );
    assert!(messenger
        .last_text_for("1")
        .is_some_and(|t| t.contains("current command (slow)")));

    // Other users are not blocked.
    assert_eq!(dispatcher.dispatch(text("2", "/getid")).await, command_ok("getid"));

    slow.release.notify_one();
    assert_eq!(running.await.expect("join"), command_ok("slow"));
    assert!(!dispatcher
        .services()
        .locks
        .is_locked(LockKind::Command, &UserId::from("1")));
    assert_eq!(dispatcher.dispatch(text("1", "/getid")).await, command_ok("getid"));
}

#[tokio::test]
async fn failing_and_panicking_commands_release_their_lock() {
    let broken = Scripted::new(CommandSpec::new("broken", "fails"), Behavior::Fail);
    let boom = Scripted::new(CommandSpec::new("boom", "panics"), Behavior::Panic);
    let (b1, b2) = (Arc::clone(&broken), Arc::clone(&boom));
    let (dispatcher, messenger) = harness(settings(), move |r| {
        r.register_command(b1).expect("broken");
        r.register_command(b2).expect("boom");
    });

    for name in ["broken", "boom"] {
        let outcome = dispatcher.dispatch(text("1", &format!("/{name}"))).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Command {
                name: name.to_string(),
                success: false
            }
        );
        assert_eq!(messenger.last_text_for("1").as_deref(), Some(COMMAND_FAILED_NOTICE));
        assert!(!dispatcher
            .services()
            .locks
            .is_locked(LockKind::Command, &UserId::from("1")));
    }
    assert_eq!(broken.runs(), 1);
    assert_eq!(boom.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn welcome_buttons_are_claimed_and_cooled_down() {
    let (dispatcher, messenger) = harness(settings(), |_| {});

    let outcome = dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Postback {
            handler: Some("welcomemessage".into()),
            success: true
        }
    );
    assert!(messenger
        .last_text_for("1")
        .is_some_and(|t| t.starts_with("Here are the available commands")));

    let outcome = dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(Rejection::PostbackCooldown {
            payload: "HELP_PAYLOAD".into(),
            remaining_secs: 3
        })
    );

    // A different button is not on cooldown.
    assert!(matches!(
        dispatcher.dispatch(postback("1", "START_CHAT")).await,
        DispatchOutcome::Postback { success: true, .. }
    ));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(matches!(
        dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await,
        DispatchOutcome::Postback { success: true, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn postback_claimant_chooses_its_cooldown() {
    let buttons = Scripted::new(CommandSpec::new("buttons", "buttons"), Behavior::Succeed);
    let registered = Arc::clone(&buttons);
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("buttons");
    });

    let outcome = dispatcher.dispatch(postback("1", "BTN_10")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Postback {
            handler: Some("buttons".into()),
            success: true
        }
    );
    assert!(matches!(
        dispatcher.dispatch(postback("1", "BTN_10")).await,
        DispatchOutcome::Rejected(Rejection::PostbackCooldown {
            remaining_secs: 10,
            ..
        })
    ));
    assert_eq!(buttons.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_postback_cooldown_is_clamped() {
    let buttons = Scripted::new(CommandSpec::new("buttons", "buttons"), Behavior::Succeed);
    let registered = Arc::clone(&buttons);
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("buttons");
    });
    let payload = format!("BTN_{}", u64::MAX);

    assert_eq!(
        dispatcher.dispatch(postback("1", &payload)).await,
        DispatchOutcome::Postback {
            handler: Some("buttons".into()),
            success: true
        }
    );
    let Rejection::PostbackCooldown { remaining_secs, .. } =
        rejection(dispatcher.dispatch(postback("1", &payload)).await)
    else {
        panic!("expected a postback cooldown");
    };
    assert_eq!(remaining_secs, MAX_COOLDOWN_SECS);
}

#[tokio::test]
async fn routed_target_that_ignores_falls_back_to_events_then_commands() {
    let picky = Claimer::new("picky", "NEVER_");
    let grabber = Claimer::new("grabber", "BTN_EVT");
    let buttons = Scripted::new(CommandSpec::new("buttons", "buttons"), Behavior::Succeed);
    let (p, g, b) = (Arc::clone(&picky), Arc::clone(&grabber), Arc::clone(&buttons));
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_event(p).expect("picky");
        r.register_event(g).expect("grabber");
        r.register_command(b).expect("buttons");
        r.route_postback_prefix("BTN_", RouteTarget::Event("picky".into()))
            .expect("route");
    });

    assert_eq!(
        dispatcher.dispatch(postback("1", "BTN_EVT")).await,
        DispatchOutcome::Postback {
            handler: Some("grabber".into()),
            success: true
        }
    );
    assert_eq!(buttons.runs(), 0);

    assert_eq!(
        dispatcher.dispatch(postback("1", "BTN_7")).await,
        DispatchOutcome::Postback {
            handler: Some("buttons".into()),
            success: true
        }
    );
    assert_eq!(buttons.runs(), 1);
    // The routed handler is offered each payload once, not again as an event.
    assert_eq!(picky.offers(), 2);
    assert_eq!(grabber.offers(), 2);
}

#[tokio::test]
async fn admin_only_commands_never_see_regular_users_buttons() {
    let secret = Scripted::new(
        CommandSpec::new("secret", "admin buttons").admin_only(),
        Behavior::Succeed,
    );
    let registered = Arc::clone(&secret);
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("secret");
    });

    assert_eq!(
        dispatcher.dispatch(postback("1", "BTN_1")).await,
        DispatchOutcome::Postback {
            handler: None,
            success: true
        }
    );
    assert_eq!(secret.runs(), 0);

    assert_eq!(
        dispatcher.dispatch(postback(ADMIN, "BTN_1")).await,
        DispatchOutcome::Postback {
            handler: Some("secret".into()),
            success: true
        }
    );
    assert_eq!(secret.runs(), 1);
}

#[tokio::test]
async fn unclaimed_postback_sets_no_cooldown() {
    let (dispatcher, messenger) = harness(settings(), |_| {});
    let unclaimed = DispatchOutcome::Postback {
        handler: None,
        success: true,
    };

    assert_eq!(dispatcher.dispatch(postback("1", "NOBODY")).await, unclaimed);
    assert_eq!(dispatcher.dispatch(postback("1", "NOBODY")).await, unclaimed);
    assert!(messenger.texts_for("1").is_empty());
}

#[tokio::test]
async fn failing_postback_notifies_and_cools_down() {
    let broken = Scripted::new(CommandSpec::new("broken", "fails"), Behavior::Fail);
    let (dispatcher, messenger) = harness(settings(), move |r| {
        r.register_command(broken).expect("broken");
    });

    let outcome = dispatcher.dispatch(postback("1", "BTN_X")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Postback {
            handler: Some("broken".into()),
            success: false
        }
    );
    assert_eq!(messenger.last_text_for("1").as_deref(), Some(POSTBACK_FAILED_NOTICE));
    assert!(matches!(
        dispatcher.dispatch(postback("1", "BTN_X")).await,
        DispatchOutcome::Rejected(Rejection::PostbackCooldown { .. })
    ));
}

#[tokio::test]
async fn postback_waits_for_running_command_and_running_postback() {
    let slow = Blocking::new("slow");
    let registered = Arc::clone(&slow);
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_command(registered).expect("slow");
    });

    // A running command blocks buttons.
    let running = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(text("1", "/slow")).await })
    };
    slow.started.notified().await;
    assert_eq!(
        dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await,
        DispatchOutcome::Rejected(Rejection::CommandBusy {
            running: "slow".into()
        })
    );
    slow.release.notify_one();
    running.await.expect("join");

    // A running postback blocks other buttons.
    let pressing = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(postback("1", "SLOW_BUTTON")).await })
    };
    slow.started.notified().await;
    assert_eq!(
        dispatcher.dispatch(postback("1", "HELP_PAYLOAD")).await,
        DispatchOutcome::Rejected(Rejection::PostbackBusy {
            running: "SLOW_BUTTON".into()
        })
    );
    // Commands are still allowed while a button is processed.
    assert!(matches!(
        dispatcher.dispatch(text("1", "/getid")).await,
        DispatchOutcome::Command { success: true, .. }
    ));
    slow.release.notify_one();
    assert_eq!(
        pressing.await.expect("join"),
        DispatchOutcome::Postback {
            handler: Some("slow".into()),
            success: true
        }
    );
}

#[tokio::test]
async fn reply_session_routes_next_message_once() {
    let (dispatcher, messenger) = harness(settings(), |r| {
        r.register_command(Quiz::new()).expect("quiz");
    });

    assert_eq!(dispatcher.dispatch(text("1", "/quiz")).await, command_ok("quiz"));
    assert_eq!(messenger.last_text_for("1").as_deref(), Some("Pick 1 or 2"));

    let outcome = dispatcher.dispatch(text("1", "2")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Reply {
            command: "quiz".into(),
            success: true
        }
    );
    assert_eq!(messenger.last_text_for("1").as_deref(), Some("You picked 2"));

    // Consumed: the next message goes to the event handlers.
    assert!(matches!(
        dispatcher.dispatch(text("1", "3")).await,
        DispatchOutcome::Events { .. }
    ));
}

#[tokio::test]
async fn commands_take_precedence_over_pending_replies() {
    let (dispatcher, _messenger) = harness(settings(), |r| {
        r.register_command(Quiz::new()).expect("quiz");
    });

    dispatcher.dispatch(text("1", "/quiz")).await;
    assert_eq!(dispatcher.dispatch(text("1", "/getid")).await, command_ok("getid"));
    assert!(matches!(
        dispatcher.dispatch(text("1", "1")).await,
        DispatchOutcome::Reply { success: true, .. }
    ));
}

#[tokio::test]
async fn busy_user_keeps_pending_reply() {
    let slow = Blocking::new("slow");
    let registered = Arc::clone(&slow);
    let (dispatcher, messenger) = harness(settings(), move |r| {
        r.register_command(Quiz::new()).expect("quiz");
        r.register_command(registered).expect("slow");
    });
    dispatcher.dispatch(text("1", "/quiz")).await;

    let running = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(text("1", "/slow")).await })
    };
    slow.started.notified().await;

    assert_eq!(
        dispatcher.dispatch(text("1", "2")).await,
        DispatchOutcome::Rejected(Rejection::CommandBusy {
            running: "slow".into()
        })
    );
    assert_eq!(
        dispatcher
            .services()
            .replies
            .pending(&UserId::from("1"))
            .await
            .as_deref(),
        Some("quiz")
    );

    slow.release.notify_one();
    assert_eq!(running.await.expect("join"), command_ok("slow"));
    assert_eq!(
        dispatcher.dispatch(text("1", "2")).await,
        DispatchOutcome::Reply {
            command: "quiz".into(),
            success: true
        }
    );
    assert_eq!(messenger.last_text_for("1").as_deref(), Some("You picked 2"));
}

#[tokio::test]
async fn reply_to_disabled_command_is_rejected_and_cancelled() {
    let (dispatcher, _messenger) = harness(settings(), |r| {
        r.register_command(Quiz::new()).expect("quiz");
    });
    dispatcher.dispatch(text("1", "/quiz")).await;
    dispatcher
        .services()
        .state
        .set_command_disabled("quiz", true)
        .await;

    assert_eq!(
        dispatcher.dispatch(text("1", "2")).await,
        DispatchOutcome::Rejected(Rejection::Disabled {
            command: "quiz".into()
        })
    );
    assert!(dispatcher
        .services()
        .replies
        .pending(&UserId::from("1"))
        .await
        .is_none());
    assert!(matches!(
        dispatcher.dispatch(text("1", "3")).await,
        DispatchOutcome::Events { .. }
    ));
}

#[tokio::test]
async fn reply_to_unknown_command_falls_through_to_events() {
    let listener = Counter::new("listener", false, false);
    let registered = Arc::clone(&listener);
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_event(registered).expect("listener");
    });
    let user = UserId::from("1");
    dispatcher.services().replies.expect(&user, "ghost").await;

    assert!(matches!(
        dispatcher.dispatch(text("1", "hello")).await,
        DispatchOutcome::Events { .. }
    ));
    assert_eq!(listener.runs(), 1);
    assert!(dispatcher.services().replies.pending(&user).await.is_none());
}

fn echo(page: &str, user: &str, body: &str) -> InboundEvent {
    let mut event = text(page, body);
    event.recipient.id = UserId::from(user);
    if let Some(message) = event.message.as_mut() {
        message.is_echo = true;
    }
    event
}

#[tokio::test]
async fn echoes_are_dropped_unless_self_listen() {
    let (dispatcher, messenger) = harness(settings(), |_| {});
    assert_eq!(
        dispatcher.dispatch(echo("PAGE", "1", "hello")).await,
        DispatchOutcome::Dropped(DropReason::Echo)
    );
    assert_eq!(messenger.text_count(), 0);
}

#[tokio::test]
async fn self_listen_runs_only_listening_handlers() {
    let listening = Counter::new("listening", true, false);
    let deaf = Counter::new("deaf", false, false);
    let (l, d) = (Arc::clone(&listening), Arc::clone(&deaf));
    let mut cfg = settings();
    cfg.self_listen = true;
    let (dispatcher, messenger) = harness(cfg, move |r| {
        r.register_event(l).expect("listening");
        r.register_event(d).expect("deaf");
    });

    let outcome = dispatcher.dispatch(echo("PAGE", "1", "hello")).await;
    assert_eq!(outcome, DispatchOutcome::Events { ran: 1 });
    assert_eq!(listening.runs(), 1);
    assert_eq!(deaf.runs(), 0);
    // The welcome handler does not listen to echoes either.
    assert!(messenger.messages_for("1").is_empty());
}

#[tokio::test]
async fn failing_event_handler_does_not_stop_the_others() {
    let failing = Counter::new("failing", false, true);
    let healthy = Counter::new("healthy", false, false);
    let (f, h) = (Arc::clone(&failing), Arc::clone(&healthy));
    let (dispatcher, _messenger) = harness(settings(), move |r| {
        r.register_event(f).expect("failing");
        r.register_event(h).expect("healthy");
    });

    let outcome = dispatcher.dispatch(text("1", "hello")).await;
    // welcome + healthy
    assert_eq!(outcome, DispatchOutcome::Events { ran: 2 });
    assert_eq!(failing.runs(), 1);
    assert_eq!(healthy.runs(), 1);
}

#[tokio::test]
async fn mark_as_seen_is_sent_when_enabled() {
    let mut cfg = settings();
    cfg.mark_as_seen = true;
    let (dispatcher, messenger) = harness(cfg, |_| {});

    dispatcher.dispatch(text("1", "/getid")).await;
    // getid records typing actions inline; mark-seen arrives from its own task.
    let seen = || {
        messenger
            .actions_for("1")
            .contains(&pagebot_core::SenderAction::MarkSeen)
    };
    for _ in 0..100 {
        if seen() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(seen());
}

#[tokio::test(start_paused = true)]
async fn sweeper_reclaims_stale_locks_until_cancelled() {
    let (dispatcher, _messenger) = harness(settings(), |_| {});
    let user = UserId::from("1");
    let locks = Arc::clone(&dispatcher.services().locks);
    let _leaked = locks
        .try_acquire(LockKind::Command, &user, "stuck")
        .expect("acquire");

    let cancel = CancellationToken::new();
    let sweeper = dispatcher.spawn_sweeper(cancel.clone());

    tokio::time::sleep(Duration::from_secs(250)).await;
    assert!(locks.is_locked(LockKind::Command, &user));

    tokio::time::sleep(Duration::from_secs(111)).await;
    assert!(!locks.is_locked(LockKind::Command, &user));

    cancel.cancel();
    sweeper.await.expect("sweeper stops");
}
