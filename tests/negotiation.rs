use std::sync::Arc;
use std::time::Duration;

use rtclink_lib::peer::events::{NegotiationEvent, SessionEvents};
use rtclink_lib::peer::mock::{MockCall, MockConnectivity, MockConnectivityFactory};
use rtclink_lib::peer::types::{Candidate, ChannelState, Role, SessionDescription, SessionState};
use rtclink_lib::{CloseReason, NegotiationError, PeerSession, SessionEvent};
use tokio::sync::mpsc;

fn session(role: Role) -> (PeerSession, SessionEvents, Arc<MockConnectivity>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mock = MockConnectivity::new(tx);
    let (session, events) = PeerSession::with_capability(role, mock.clone(), rx);
    (session, events, mock)
}

async fn next_event(events: &mut SessionEvents) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event stream ended")
}

fn drain(events: &mut SessionEvents) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

fn candidate(n: usize) -> Candidate {
    Candidate::new(format!("c{n}"), "0", 0)
}

#[tokio::test]
async fn offerer_happy_path() {
    let (session, mut events, mock) = session(Role::Offerer);
    mock.set_offer_body("sdp-O");

    session.create_offer().await.unwrap();
    assert_eq!(session.state(), SessionState::OfferCreated);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LocalDescriptionReady(SessionDescription::offer("sdp-O"))
    );

    session
        .apply_remote_answer(SessionDescription::answer("sdp-A"))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::RemoteDescriptionSet);

    mock.open_channel();
    assert_eq!(next_event(&mut events).await, SessionEvent::Ready);
    assert_eq!(session.state(), SessionState::Open);
    assert!(session.is_open());

    session.send("hello").await.unwrap();
    assert_eq!(
        mock.calls(),
        vec![
            MockCall::CreateLocalOffer,
            MockCall::SetRemoteDescription(SessionDescription::answer("sdp-A")),
            MockCall::SendBytes("hello".into()),
        ]
    );
}

#[tokio::test]
async fn candidate_before_description_is_buffered() {
    let (session, _events, mock) = session(Role::Offerer);
    session.create_offer().await.unwrap();

    let c1 = Candidate::new("c1", "0", 0);
    session.add_remote_candidate(c1.clone()).await.unwrap();
    assert_eq!(session.pending_candidate_count(), 1);
    assert!(mock.forwarded_candidates().is_empty());

    session
        .apply_remote_answer(SessionDescription::answer("sdp-A"))
        .await
        .unwrap();
    assert_eq!(session.pending_candidate_count(), 0);
    assert_eq!(mock.forwarded_candidates(), vec![c1]);
    assert!(mock.premature_candidates().is_empty());
}

#[tokio::test]
async fn late_local_candidate_after_close_is_ignored() {
    let (session, mut events, mock) = session(Role::Offerer);
    session.create_offer().await.unwrap();
    session
        .apply_remote_answer(SessionDescription::answer("sdp-A"))
        .await
        .unwrap();
    mock.open_channel();
    let _ = next_event(&mut events).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Ready);

    session.close().await;
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Closed(CloseReason::Requested)
    );

    mock.discover_candidate(candidate(9));
    session
        .handle_event(NegotiationEvent::LocalCandidate(candidate(9)))
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn answerer_path() {
    let (session, mut events, mock) = session(Role::Answerer);
    mock.set_answer_body("sdp-A");

    session
        .create_answer(SessionDescription::offer("sdp-O"))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::RemoteDescriptionSet);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LocalDescriptionReady(SessionDescription::answer("sdp-A"))
    );
    assert_eq!(
        mock.calls(),
        vec![
            MockCall::SetRemoteDescription(SessionDescription::offer("sdp-O")),
            MockCall::CreateLocalAnswer,
        ]
    );
}

#[tokio::test]
async fn answerer_buffers_candidates_that_beat_the_offer() {
    let (session, _events, mock) = session(Role::Answerer);
    session.add_remote_candidate(candidate(1)).await.unwrap();
    session.add_remote_candidate(candidate(2)).await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);

    session
        .create_answer(SessionDescription::offer("sdp-O"))
        .await
        .unwrap();
    assert_eq!(mock.forwarded_candidates(), vec![candidate(1), candidate(2)]);
    assert!(mock.premature_candidates().is_empty());
}

#[tokio::test]
async fn every_interleaving_forwards_each_candidate_once() {
    const COUNT: usize = 4;
    for answer_at in 0..=COUNT {
        let (session, _events, mock) = session(Role::Offerer);
        session.create_offer().await.unwrap();

        for n in 0..=COUNT {
            if n == answer_at {
                session
                    .apply_remote_answer(SessionDescription::answer("sdp-A"))
                    .await
                    .unwrap();
            }
            if n < COUNT {
                session.add_remote_candidate(candidate(n)).await.unwrap();
            }
        }

        let forwarded = mock.forwarded_candidates();
        assert_eq!(
            forwarded,
            (0..COUNT).map(candidate).collect::<Vec<_>>(),
            "answer applied at position {answer_at}"
        );
        assert!(mock.premature_candidates().is_empty());
        assert_eq!(session.pending_candidate_count(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_candidates_and_answer_never_lose_or_repeat() {
    const COUNT: usize = 32;
    for _ in 0..10 {
        let (session, _events, mock) = session(Role::Offerer);
        session.create_offer().await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..COUNT {
            let candidate_session = session.clone();
            tasks.push(tokio::spawn(async move {
                candidate_session.add_remote_candidate(candidate(n)).await
            }));
            if n == COUNT / 2 {
                let session = session.clone();
                tasks.push(tokio::spawn(async move {
                    session
                        .apply_remote_answer(SessionDescription::answer("sdp-A"))
                        .await
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut forwarded: Vec<String> = mock
            .forwarded_candidates()
            .into_iter()
            .map(|c| c.candidate)
            .collect();
        forwarded.sort();
        let mut expected: Vec<String> = (0..COUNT).map(|n| format!("c{n}")).collect();
        expected.sort();
        assert_eq!(forwarded, expected);
        assert!(mock.premature_candidates().is_empty());
    }
}

#[tokio::test]
async fn close_is_idempotent_from_every_state() {
    for stage in 0..4 {
        let (session, mut events, mock) = session(Role::Offerer);
        if stage >= 1 {
            session.create_offer().await.unwrap();
        }
        if stage >= 2 {
            session
                .apply_remote_answer(SessionDescription::answer("sdp-A"))
                .await
                .unwrap();
        }
        if stage >= 3 {
            session
                .handle_event(NegotiationEvent::ChannelState(ChannelState::Open))
                .await;
            assert_eq!(session.state(), SessionState::Open);
        }

        session.close().await;
        session.close().await;
        session.close().await;

        let closed: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Closed(_)))
            .collect();
        assert_eq!(closed, vec![SessionEvent::Closed(CloseReason::Requested)]);
        assert_eq!(
            mock.calls().iter().filter(|c| **c == MockCall::Close).count(),
            1
        );
        assert_eq!(session.state(), SessionState::Closed);
    }
}

#[tokio::test]
async fn operations_after_close_are_rejected() {
    let (session, _events, _mock) = session(Role::Offerer);
    session.close().await;

    assert!(matches!(
        session.create_offer().await,
        Err(NegotiationError::InvalidState { .. })
    ));
    assert!(matches!(
        session.add_remote_candidate(candidate(0)).await,
        Err(NegotiationError::InvalidState { .. })
    ));
    assert_eq!(session.send("x").await, Err(NegotiationError::NotReady));
}

#[tokio::test]
async fn capability_failure_event_closes_session() {
    let (session, mut events, mock) = session(Role::Offerer);
    session.create_offer().await.unwrap();
    let _ = next_event(&mut events).await;

    mock.emit(NegotiationEvent::Failed("ice failed".into()));
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Closed(CloseReason::CapabilityFailed("ice failed".into()))
    );
    assert!(mock.is_closed());
}

#[tokio::test]
async fn factory_failure_surfaces_from_new() {
    let factory = MockConnectivityFactory::new();
    factory.fail_creation(true);
    let err = PeerSession::new(Role::Offerer, &factory).await.err();
    assert!(matches!(err, Some(NegotiationError::Capability(_))));
    assert!(factory.last().is_none());

    factory.fail_creation(false);
    let (session, _events) = PeerSession::new(Role::Offerer, &factory).await.unwrap();
    session.create_offer().await.unwrap();
    assert_eq!(
        factory.last().unwrap().calls(),
        vec![MockCall::CreateLocalOffer]
    );
}

#[tokio::test]
async fn candidates_after_open_are_forwarded_as_path_updates() {
    let (session, mut events, mock) = session(Role::Offerer);
    session.create_offer().await.unwrap();
    session
        .apply_remote_answer(SessionDescription::answer("sdp-A"))
        .await
        .unwrap();
    mock.open_channel();
    let _ = next_event(&mut events).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Ready);

    let late = Candidate::new("late", "0", 0);
    session.add_remote_candidate(late.clone()).await.unwrap();

    assert_eq!(mock.forwarded_candidates(), vec![late]);
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.pending_candidate_count(), 0);
}

#[tokio::test]
async fn send_is_refused_while_the_offer_is_being_applied() {
    let (session, _events, mock) = session(Role::Answerer);
    let release = mock.hold_remote_descriptions();

    let answering = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .create_answer(SessionDescription::offer("sdp-O"))
                .await
        }
    });

    tokio::time::timeout(Duration::from_secs(2), async {
        while session.state() != SessionState::AnswerCreated {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("answer never started");

    assert_eq!(session.send("too early").await, Err(NegotiationError::NotReady));
    assert!(mock.sent().is_empty());

    release.notify_one();
    answering.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::RemoteDescriptionSet);
    assert_eq!(session.send("still early").await, Err(NegotiationError::NotReady));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nothing_is_emitted_after_closed() {
    for _ in 0..200 {
        let (session, mut events, mock) = session(Role::Offerer);
        session.create_offer().await.unwrap();
        session
            .apply_remote_answer(SessionDescription::answer("sdp-A"))
            .await
            .unwrap();
        session
            .handle_event(NegotiationEvent::ChannelState(ChannelState::Open))
            .await;

        let emitter = tokio::spawn({
            let session = session.clone();
            async move {
                for n in 0..50 {
                    session
                        .handle_event(NegotiationEvent::LocalCandidate(candidate(n)))
                        .await;
                    session
                        .handle_event(NegotiationEvent::Message("m".into()))
                        .await;
                }
            }
        });
        for n in 0..10 {
            mock.discover_candidate(candidate(100 + n));
        }
        session.close().await;
        emitter.await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let evs = drain(&mut events);
        let closed_at = evs
            .iter()
            .position(|e| matches!(e, SessionEvent::Closed(_)))
            .expect("Closed was emitted");
        assert_eq!(closed_at, evs.len() - 1, "events after Closed: {:?}", &evs[closed_at..]);
    }
}
