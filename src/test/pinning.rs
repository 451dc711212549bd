use std::{collections::HashSet, time::Duration};

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Document},
    error::{ErrorKind, TRANSIENT_TRANSACTION_ERROR},
    options::{ClientOptions, ReadPreference, SelectionCriteria, TransactionOptions},
    sdam::{ServerType, TopologyType},
    test::{FailPoint, TestCluster},
    TransactionState,
};

const ITERATIONS: usize = 20;

#[tokio::test]
#[function_name::named]
async fn transaction_operations_share_one_router() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    for _ in 0..5 {
        session.start_transaction(None).unwrap();
        coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
            .await
            .unwrap();
        coll.find_with_session(doc! {}, None, &mut session)
            .await
            .unwrap();
        coll.count_documents_with_session(doc! {}, &mut session)
            .await
            .unwrap();
        coll.delete_many_with_session(doc! { "x": 2 }, &mut session)
            .await
            .unwrap();
        let pinned = session.pinned_router().cloned().unwrap();
        session.commit_transaction().await.unwrap();

        let routes: HashSet<_> = cluster
            .routed_events()
            .into_iter()
            .map(|event| event.address)
            .collect();
        assert_eq!(routes, HashSet::from([pinned]));
        cluster.events.clear_cached_events();
    }
}

#[tokio::test]
#[function_name::named]
async fn finishing_a_transaction_clears_the_pin() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    assert!(session.pinned_router().is_some());
    session.commit_transaction().await.unwrap();
    assert_eq!(session.pinned_router(), None);
    assert_eq!(session.transaction_state(), TransactionState::None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap();
    assert!(session.pinned_router().is_some());
    session.abort_transaction().await.unwrap();
    assert_eq!(session.pinned_router(), None);
    assert_eq!(session.transaction_state(), TransactionState::None);

    // only the committed insert is visible
    assert_eq!(coll.count_documents(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
#[function_name::named]
async fn non_transactional_command_clears_the_pin() {
    let cluster = TestCluster::sharded(2);
    let db = cluster.client.database(function_name!());
    let coll = db.collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    assert!(session.pinned_router().is_some());

    db.run_command_with_session(doc! { "ping": 1 }, None, &mut session)
        .await
        .unwrap();
    assert_eq!(session.pinned_router(), None);
    assert_eq!(session.transaction_state(), TransactionState::InProgress);

    let ping = cluster
        .routed_events()
        .into_iter()
        .find(|event| event.command_name == "ping")
        .unwrap();
    assert!(!ping.pinned);
    assert!(ping.command.get("txnNumber").is_none());
    assert!(ping.command.get("autocommit").is_none());

    // the abort may or may not reach the router that holds the transaction
    let _ = session.abort_transaction().await;
    assert_eq!(session.transaction_state(), TransactionState::None);
}

#[tokio::test]
#[function_name::named]
async fn transactional_finds_spread_across_routers() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "_id": 1 }, &mut session)
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();
    cluster.events.clear_cached_events();

    for _ in 0..ITERATIONS {
        session.start_transaction(None).unwrap();
        let docs = coll
            .find_with_session(doc! {}, None, &mut session)
            .await
            .unwrap();
        assert_eq!(docs, vec![doc! { "_id": 1 }]);
        session.commit_transaction().await.unwrap();
    }

    let finds = cluster.routes_of("find");
    let commits = cluster.routes_of("commitTransaction");
    assert_eq!(finds.len(), ITERATIONS);
    assert_eq!(finds, commits);
    let distinct: HashSet<_> = finds.into_iter().collect();
    assert!(distinct.len() >= 2, "all transactions used {:?}", distinct);
}

#[tokio::test]
#[function_name::named]
async fn non_transactional_finds_spread_across_routers() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "_id": 1 }, &mut session)
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();
    cluster.events.clear_cached_events();

    for _ in 0..ITERATIONS {
        let docs = coll
            .find_with_session(doc! {}, None, &mut session)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    let distinct: HashSet<_> = cluster.routes_of("find").into_iter().collect();
    assert!(distinct.len() >= 2, "all finds used {:?}", distinct);
}

#[tokio::test]
async fn transaction_misuse_is_rejected() {
    let cluster = TestCluster::sharded(2);
    let mut session = cluster.client.start_session(None);

    let error = session.commit_transaction().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Transaction { .. }));
    let error = session.abort_transaction().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::Transaction { .. }));

    session.start_transaction(None).unwrap();
    let error = session.start_transaction(None).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::TransactionInProgress));

    // nothing ran, so nothing is sent
    session.commit_transaction().await.unwrap();
    assert!(cluster.routed_events().is_empty());
}

#[tokio::test]
#[function_name::named]
async fn first_command_starts_the_transaction() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    coll.insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();

    let events = cluster.routed_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].command.get_bool("startTransaction"), Ok(true));
    assert!(events[1].command.get("startTransaction").is_none());
    assert!(events[2].command.get("startTransaction").is_none());
    for event in &events {
        assert_eq!(event.command.get_i64("txnNumber"), Ok(1));
        assert_eq!(event.command.get_bool("autocommit"), Ok(false));
        assert_eq!(event.command.get_document("lsid"), Ok(session.id()));
        assert!(event.pinned);
        assert!(event.session_id.is_some());
    }
    assert_eq!(events[2].command_name, "commitTransaction");
    assert_eq!(events[2].db, "admin");
}

#[tokio::test]
#[function_name::named]
async fn failed_commit_retries_on_the_pinned_router() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let pinned = session.pinned_router().cloned().unwrap();

    cluster
        .cluster
        .fail_command(FailPoint::network_error("commitTransaction"));
    let error = session.commit_transaction().await.unwrap_err();
    assert!(error.is_network_error());
    assert_eq!(session.transaction_state(), TransactionState::Committing);
    assert_eq!(session.pinned_router(), Some(&pinned));

    // the pinned router dropped out of the topology; the retry still goes there
    cluster.mark_unknown(&pinned);

    let error = coll
        .insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(
        *error.kind,
        ErrorKind::TransactionStateConflict { .. }
    ));

    session.commit_transaction().await.unwrap();
    assert_eq!(session.transaction_state(), TransactionState::None);
    assert_eq!(
        cluster.routes_of("commitTransaction"),
        vec![pinned.clone(), pinned]
    );
    assert_eq!(
        cluster.cluster.documents(&coll.namespace().to_string()).len(),
        1
    );
}

#[tokio::test]
#[function_name::named]
async fn network_error_keeps_the_pin() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let pinned = session.pinned_router().cloned().unwrap();

    cluster
        .cluster
        .fail_command(FailPoint::network_error("insert").on(&pinned));
    let error = coll
        .insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap_err();
    assert!(error.is_network_error());
    assert_eq!(session.pinned_router(), Some(&pinned));

    coll.insert_one_with_session(doc! { "x": 3 }, &mut session)
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();

    let routes: HashSet<_> = cluster
        .routed_events()
        .into_iter()
        .map(|event| event.address)
        .collect();
    assert_eq!(routes, HashSet::from([pinned]));
}

#[tokio::test]
#[function_name::named]
async fn unreachable_pinned_router_is_not_replaced() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let pinned = session.pinned_router().cloned().unwrap();
    cluster.cluster.shut_down(&pinned);

    for _ in 0..3 {
        let error = coll
            .find_with_session(doc! {}, None, &mut session)
            .await
            .unwrap_err();
        assert!(error.is_network_error());
        assert_eq!(session.pinned_router(), Some(&pinned));
    }

    session.abort_transaction().await.unwrap_err();
    assert_eq!(session.transaction_state(), TransactionState::None);
    assert_eq!(session.pinned_router(), None);

    cluster.cluster.start(&pinned);
    assert_eq!(coll.count_documents(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
#[function_name::named]
async fn repinning_after_a_cleared_pin_reaches_a_router_without_the_transaction() {
    let cluster = TestCluster::sharded(2);
    let db = cluster.client.database(function_name!());
    let coll = db.collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let first = session.pinned_router().cloned().unwrap();

    db.run_command_with_session(doc! { "ping": 1 }, None, &mut session)
        .await
        .unwrap();
    cluster.mark_unknown(&first);

    let error = coll
        .insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some(251));
    assert!(error.contains_label(TRANSIENT_TRANSACTION_ERROR));
    assert!(session.pinned_router().is_some());
    assert_ne!(session.pinned_router(), Some(&first));
}

#[tokio::test]
#[function_name::named]
async fn commit_sends_max_commit_time() {
    let cluster = TestCluster::sharded(1);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    let options = TransactionOptions::builder()
        .max_commit_time(Duration::from_millis(500))
        .build();
    session.start_transaction(options).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    session.commit_transaction().await.unwrap();

    let commit = cluster
        .routed_events()
        .into_iter()
        .find(|event| event.command_name == "commitTransaction")
        .unwrap();
    assert_eq!(commit.command.get_i64("maxTimeMS"), Ok(500));
}

#[tokio::test]
#[function_name::named]
async fn transactional_read_preference_must_be_primary() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);
    session.start_transaction(None).unwrap();

    let options = crate::options::FindOptions::builder()
        .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Nearest {
            options: None,
        }))
        .build();
    let error = coll
        .find_with_session(doc! {}, options, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidArgument { .. }));
    assert_eq!(session.transaction_state(), TransactionState::Starting);
    assert!(cluster.routed_events().is_empty());
}

#[tokio::test]
#[function_name::named]
async fn replica_set_transactions_are_not_pinned() {
    let cluster = TestCluster::replica_set(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    assert_eq!(session.pinned_router(), None);
    assert_eq!(session.transaction_state(), TransactionState::InProgress);
    session.commit_transaction().await.unwrap();

    let primary = cluster.servers[0].clone();
    let routes: HashSet<_> = cluster
        .routed_events()
        .into_iter()
        .map(|event| event.address)
        .collect();
    assert_eq!(routes, HashSet::from([primary]));
}

#[tokio::test]
async fn selection_waits_for_a_router_to_appear() {
    let cluster = TestCluster::builder(TopologyType::Sharded, ServerType::Unknown, 1)
        .options(
            ClientOptions::builder()
                .server_selection_timeout(Duration::from_secs(5))
                .build(),
        )
        .build();
    let db = cluster.client.database("admin");

    let topology = cluster.topology.clone();
    let address = cluster.servers[0].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        topology.update_server(
            crate::sdam::ServerDescription::new(address, ServerType::Mongos)
                .with_round_trip_time(Duration::from_millis(5)),
        );
    });

    db.run_command(doc! { "ping": 1 }, None).await.unwrap();
    assert_eq!(cluster.routes_of("ping"), vec![cluster.servers[0].clone()]);
}

#[tokio::test]
async fn selection_times_out_without_routers() {
    let cluster = TestCluster::builder(TopologyType::Sharded, ServerType::Unknown, 2).build();
    let mut session = cluster.client.start_session(None);
    session.start_transaction(None).unwrap();

    let error = cluster
        .client
        .database("db")
        .collection::<Document>("coll")
        .insert_one_with_session(doc! {}, &mut session)
        .await
        .unwrap_err();

    assert!(error.is_server_selection_error());
    assert_eq!(session.transaction_state(), TransactionState::Starting);
    assert!(cluster.routed_events().is_empty());
}

#[tokio::test]
#[function_name::named]
async fn concurrent_sessions_pin_independently() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database(function_name!())
        .collection::<Document>(function_name!());

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = cluster.client.clone();
        let coll = coll.clone();
        handles.push(tokio::spawn(async move {
            let mut session = client.start_session(None);
            session.start_transaction(None).unwrap();
            for j in 0..3 {
                coll.insert_one_with_session(doc! { "i": i, "j": j }, &mut session)
                    .await
                    .unwrap();
            }
            let pinned = session.pinned_router().cloned().unwrap();
            session.commit_transaction().await.unwrap();
            (session.id().clone(), pinned)
        }));
    }

    let pins: Vec<_> = futures::future::try_join_all(handles).await.unwrap();

    let events = cluster.routed_events();
    for (lsid, pinned) in pins {
        let routes: HashSet<_> = events
            .iter()
            .filter(|event| event.command.get_document("lsid") == Ok(&lsid))
            .map(|event| event.address.clone())
            .collect();
        assert_eq!(routes, HashSet::from([pinned]));
    }
    assert_eq!(
        cluster.cluster.documents(&coll.namespace().to_string()).len(),
        24
    );
}

#[tokio::test]
async fn ending_a_session_aborts_its_transaction() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database("db")
        .collection::<Document>("ending");
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let pinned = session.pinned_router().cloned().unwrap();
    assert_eq!(cluster.cluster.open_transactions(&pinned), 1);

    session.end().await.unwrap();
    assert!(session.is_ended());
    assert_eq!(cluster.cluster.open_transactions(&pinned), 0);
    assert_eq!(cluster.routes_of("abortTransaction"), vec![pinned]);

    let error = coll
        .insert_one_with_session(doc! { "x": 2 }, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::SessionEnded));
    let error = session.start_transaction(None).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::SessionEnded));
}

#[tokio::test]
async fn dropping_a_session_aborts_in_the_background() {
    let cluster = TestCluster::sharded(2);
    let coll = cluster
        .client
        .database("db")
        .collection::<Document>("dropping");
    let mut session = cluster.client.start_session(None);

    session.start_transaction(None).unwrap();
    coll.insert_one_with_session(doc! { "x": 1 }, &mut session)
        .await
        .unwrap();
    let pinned = session.pinned_router().cloned().unwrap();
    drop(session);

    for _ in 0..100 {
        if cluster.cluster.open_transactions(&pinned) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cluster.cluster.open_transactions(&pinned), 0);
    assert_eq!(cluster.routes_of("abortTransaction"), vec![pinned]);
    assert!(cluster
        .cluster
        .documents(&coll.namespace().to_string())
        .is_empty());
}

#[tokio::test]
async fn selection_timeout_at_the_deadline_fails_cleanly() {
    for micros in 0..20 {
        let cluster = TestCluster::builder(TopologyType::Sharded, ServerType::Unknown, 1)
            .options(
                ClientOptions::builder()
                    .server_selection_timeout(Duration::from_micros(micros))
                    .build(),
            )
            .build();

        let error = cluster
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .unwrap_err();
        assert!(error.is_server_selection_error());
    }
}
