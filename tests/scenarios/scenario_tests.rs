//! Scenario and property tests over the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::fakes::{CheckoutMode, FakeDecoderSource};
use super::harness::{TestHarness, STUDENT_ID, VENDOR_ID};
use bytes::Bytes;
use schoolpay::error::{
    DecoderError, Error, FailureReason, LedgerError, ParseError, ResolveError, ScanError,
    ValidationError,
};
use schoolpay::payment::charge;
use schoolpay::scan::{scan_image, FrameResult, ImageInput};
use schoolpay::{
    ActorContext, Money, PaymentPhase, QrPayload, Reconciler, Role, ScanOutcome, ScanPhase,
};
use std::sync::Arc;
use std::time::Duration;

fn vendor_frame() -> FrameResult {
    FrameResult::Decoded(r#"{"vendor_id":"VEN001"}"#.to_string())
}

fn png(name: &str) -> ImageInput {
    ImageInput {
        name: name.to_string(),
        content_type: "image/png".to_string(),
        data: Bytes::from_static(b"\x89PNG\r\n"),
    }
}

/// Scenario A: a vendor code scanned where a student code is expected is
/// rejected without touching the ledger, and scanning can resume.
#[tokio::test]
async fn test_scenario_a_wrong_role_makes_no_network_call() {
    let harness = TestHarness::setup();
    let decoders = Arc::new(FakeDecoderSource::with_cameras(&["rear"]).frames(vec![
        FrameResult::NoCode("out of focus".to_string()),
        vendor_frame(),
    ]));
    let mut session = harness.scan_session(&decoders, Role::Student);

    session.start().await.expect("Failed to start scanner");
    session.begin_scan().await.expect("Failed to begin scan");
    let outcome = session.next_scan().await;

    assert_eq!(
        outcome,
        ScanOutcome::Rejected(ScanError::Resolve(ResolveError::WrongRole {
            expected: Role::Student,
            actual: Role::Vendor,
        }))
    );
    assert_eq!(session.phase(), ScanPhase::Ready);
    assert_eq!(harness.ledger.calls().total(), 0);

    session.stop().await;
    assert_eq!(decoders.outstanding(), 0);
}

/// Scenario B: scan a vendor, recharge 100.00, checkout pays, ledger
/// verifies, the dashboard refreshes exactly once.
#[tokio::test]
async fn test_scenario_b_verified_recharge_settles_and_refreshes_once() {
    let harness = TestHarness::setup();
    let decoders =
        Arc::new(FakeDecoderSource::with_cameras(&["rear"]).frames(vec![vendor_frame()]));
    let checkout = harness.checkout(CheckoutMode::Pay);
    let context = ActorContext::Parent {
        student_id: Some(STUDENT_ID.to_string()),
    };

    let mut scanner = harness.scan_session(&decoders, context.expected_scan_role());
    scanner.start().await.expect("Failed to start scanner");
    scanner.begin_scan().await.expect("Failed to begin scan");
    let ScanOutcome::Resolved(vendor) = scanner.next_scan().await else {
        panic!("vendor code should resolve");
    };
    scanner.stop().await;
    assert_eq!(vendor.display_name, "School Canteen");

    let mut reconciler = Reconciler::for_context(harness.ledger.clone(), &context)
        .expect("parent with a student has a dashboard");
    reconciler.refresh().await.expect("Failed initial refresh");

    let mut payment = harness.parent_session(&checkout);
    payment.set_counterparty(vendor).expect("Failed to set vendor");
    let order = payment
        .create_order(Money::from_whole(100))
        .await
        .expect("Failed to create order");
    assert_eq!(order.amount, Money::from_whole(100));
    assert_eq!(payment.phase(), &PaymentPhase::AwaitingProviderOpen);

    payment.open_provider().await.expect("Failed to open checkout");
    let settlement = payment.await_result().await.expect("Recharge should settle");
    assert_eq!(payment.phase(), &PaymentPhase::Settled);
    assert_eq!(settlement.new_balance, Money::from_whole(130));
    assert_eq!(settlement.vendor_id.as_deref(), Some(VENDOR_ID));

    let before = harness.ledger.calls();
    let view = reconciler
        .on_settled(&settlement)
        .await
        .expect("Failed to reconcile");
    let after = harness.ledger.calls();

    assert_eq!(view.identity.balance, Money::from_whole(130));
    assert_eq!(view.transactions.len(), 1);
    assert_eq!(after.get_identity - before.get_identity, 1);
    assert_eq!(after.list_transactions - before.list_transactions, 1);
    assert_eq!(after.verify_recharge_payment, 1);
    assert_eq!(harness.student_balance(), Some(Money::from_whole(130)));
}

/// Scenario C: the checkout never answers; the screen abandons the session
/// and no verification is attempted.
#[tokio::test]
async fn test_scenario_c_abandoned_checkout_never_verifies() {
    let harness = TestHarness::setup();
    let checkout = harness.checkout(CheckoutMode::Ignore);
    let vendor = harness
        .resolver
        .resolve(&QrPayload::for_account(Role::Vendor, VENDOR_ID), Role::Vendor)
        .await
        .expect("Failed to resolve vendor");

    let mut payment = harness.parent_session(&checkout);
    payment.set_counterparty(vendor).expect("Failed to set vendor");
    payment
        .create_order(Money::from_whole(100))
        .await
        .expect("Failed to create order");
    payment.open_provider().await.expect("Failed to open checkout");
    assert_eq!(checkout.opened(), 1);

    let abandon = payment.abandon_handle();
    let waiter = tokio::spawn(async move {
        let result = payment.await_result().await;
        (result, payment)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    abandon.abandon();

    let (result, payment) = waiter.await.expect("Waiter panicked");
    let err = result.expect_err("Abandoned checkout must not settle");
    assert!(matches!(
        err,
        Error::PaymentFailed(FailureReason::UserAbandoned)
    ));
    assert!(!FailureReason::UserAbandoned.is_error());
    assert_eq!(
        payment.phase(),
        &PaymentPhase::Failed(FailureReason::UserAbandoned)
    );
    assert_eq!(harness.ledger.calls().verify_recharge_payment, 0);
    assert_eq!(harness.student_balance(), Some(Money::from_whole(30)));
}

/// Scenario C, variant: closing the widget drops the result channel, which
/// counts as abandonment too.
#[tokio::test]
async fn test_scenario_c_closed_widget_is_abandonment() {
    let harness = TestHarness::setup();
    let checkout = harness.checkout(CheckoutMode::Close);
    let vendor = harness
        .resolver
        .resolve(&QrPayload::for_account(Role::Vendor, VENDOR_ID), Role::Vendor)
        .await
        .expect("Failed to resolve vendor");

    let mut payment = harness.parent_session(&checkout);
    payment.set_counterparty(vendor).expect("Failed to set vendor");
    let result = payment.run(Money::from_whole(100)).await;

    assert!(matches!(
        result,
        Err(Error::PaymentFailed(FailureReason::UserAbandoned))
    ));
    assert_eq!(harness.ledger.calls().verify_recharge_payment, 0);
}

/// Scenario D: charging 50.00 against a 30.00 balance fails with no
/// mutation on either side.
#[tokio::test]
async fn test_scenario_d_insufficient_funds_changes_nothing() {
    let harness = TestHarness::setup();
    let student = harness
        .resolver
        .resolve(&QrPayload::for_account(Role::Student, STUDENT_ID), Role::Student)
        .await
        .expect("Failed to resolve student");
    let vendor = ActorContext::Vendor {
        vendor_id: VENDOR_ID.to_string(),
    };

    let result = charge(
        harness.ledger.as_ref(),
        &vendor,
        Some(&student),
        Money::from_whole(50),
        Some("lunch"),
    )
    .await;

    let err = result.expect_err("Charge must fail");
    assert!(matches!(err, Error::Ledger(LedgerError::InsufficientFunds)));
    assert!(err.user_message().contains("Insufficient balance"));
    assert_eq!(harness.student_balance(), Some(Money::from_whole(30)));
    assert_eq!(harness.vendor_balance(), Some(Money::ZERO));

    let mut reconciler = Reconciler::new(harness.ledger.clone(), Role::Student, STUDENT_ID);
    let view = reconciler.refresh().await.expect("Failed to refresh");
    assert!(view.transactions.is_empty());
}

/// Scenario E: an uploaded image without a code surfaces `NotStructured`
/// and the decoder used for it is released.
#[tokio::test]
async fn test_scenario_e_blank_upload_releases_decoder() {
    let harness = TestHarness::setup();
    let decoders = FakeDecoderSource::with_cameras(&[]);

    let result = scan_image(
        &decoders,
        &harness.resolver,
        &png("blank.png"),
        Role::Vendor,
    )
    .await;

    assert_eq!(result, Err(ScanError::Parse(ParseError::NotStructured)));
    assert_eq!(decoders.acquired(), 1);
    assert_eq!(decoders.outstanding(), 0);
    assert_eq!(harness.ledger.calls().total(), 0);
}

/// Upload stays usable when the camera was refused.
#[tokio::test]
async fn test_upload_fallback_after_camera_denied() {
    let harness = TestHarness::setup();
    let decoders = Arc::new(
        FakeDecoderSource::with_cameras(&["rear"])
            .deny_camera()
            .image_text(r#"{"student_id": "STU001"}"#),
    );
    let mut session = harness.scan_session(&decoders, Role::Student);

    let err = session.start().await.expect_err("Camera should be refused");
    assert_eq!(err, ScanError::Decoder(DecoderError::PermissionDenied));
    assert_eq!(session.phase(), ScanPhase::Failed);
    assert_eq!(decoders.outstanding(), 0);

    let student = session
        .upload(&png("id-card.png"))
        .await
        .expect("Upload should resolve");
    assert_eq!(student.id, STUDENT_ID);
    assert_eq!(decoders.outstanding(), 0);
}

/// Every well-formed payload parses to its role and id; malformed text
/// never does.
#[test]
fn test_payload_parse_properties() {
    for id in ["VEN001", "v", "canteen-north", "विक्रेता"] {
        let raw = format!(r#"{{"vendor_id": "{id}"}}"#);
        let payload = QrPayload::parse(&raw).expect("vendor payload");
        assert_eq!(payload, QrPayload::for_account(Role::Vendor, id));
    }
    for id in ["STU001", "2024-117"] {
        let raw = format!(r#"{{"student_id":"{id}","issued":"2024"}}"#);
        let payload = QrPayload::parse(&raw).expect("student payload");
        assert_eq!(payload.role(), Role::Student);
        assert_eq!(payload.id(), id);
    }
    for raw in ["", "VEN001", "[1,2]", "null", r#"{"vendor_id": ""}"#, r#"{"name":"x"}"#] {
        assert!(QrPayload::parse(raw).is_err(), "{raw:?} should not parse");
    }
}

/// Non-positive amounts and missing counterparties never leave selection.
#[tokio::test]
async fn test_order_guard_property() {
    let harness = TestHarness::setup();
    let checkout = harness.checkout(CheckoutMode::Pay);
    let mut payment = harness.parent_session(&checkout);

    let missing = payment.create_order(Money::from_whole(10)).await;
    assert!(matches!(
        missing,
        Err(Error::Validation(ValidationError::MissingCounterparty))
    ));

    let vendor = harness
        .resolver
        .resolve(&QrPayload::for_account(Role::Vendor, VENDOR_ID), Role::Vendor)
        .await
        .expect("Failed to resolve vendor");
    payment.set_counterparty(vendor).expect("Failed to set vendor");
    for minor in [0, -1, -10_000] {
        let result = payment.create_order(Money::from_minor(minor)).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::NonPositiveAmount))
        ));
        assert_eq!(payment.phase(), &PaymentPhase::SelectingCounterparty);
    }
    assert_eq!(harness.ledger.calls().create_recharge_order, 0);
}

/// Two refreshes with no intervening writes agree.
#[tokio::test]
async fn test_refresh_idempotence_property() {
    let harness = TestHarness::setup();
    let student = harness
        .resolver
        .resolve(&QrPayload::for_account(Role::Student, STUDENT_ID), Role::Student)
        .await
        .expect("Failed to resolve student");
    let vendor = ActorContext::Vendor {
        vendor_id: VENDOR_ID.to_string(),
    };
    for rupees in [4, 6] {
        charge(
            harness.ledger.as_ref(),
            &vendor,
            Some(&student),
            Money::from_whole(rupees),
            None,
        )
        .await
        .expect("Failed to charge");
    }

    let mut reconciler = Reconciler::for_context(harness.ledger.clone(), &vendor)
        .expect("vendor has a dashboard");
    let first = reconciler.refresh().await.expect("refresh").clone();
    let second = reconciler.refresh().await.expect("refresh").clone();
    assert_eq!(first, second);
    assert_eq!(first.identity.balance, Money::from_whole(10));
}

/// Aborting a scan mid-stream releases the decoder.
#[tokio::test]
async fn test_abort_releases_decoder() {
    let harness = TestHarness::setup();
    let decoders = Arc::new(FakeDecoderSource::with_cameras(&["rear", "front"]));
    let mut session = harness.scan_session(&decoders, Role::Vendor);
    session.start().await.expect("Failed to start scanner");
    session.begin_scan().await.expect("Failed to begin scan");

    let abort = session.abort_handle();
    let waiter = tokio::spawn(async move {
        let outcome = session.next_scan().await;
        (outcome, session)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    abort.abort();

    let (outcome, session) = waiter.await.expect("Waiter panicked");
    assert_eq!(outcome, ScanOutcome::Aborted);
    assert_eq!(session.phase(), ScanPhase::Stopped);
    assert_eq!(decoders.outstanding(), 0);
}

/// An abort sent while no scan is waiting still wins over a code that is
/// already buffered.
#[tokio::test]
async fn test_abort_before_next_scan_discards_buffered_code() {
    let harness = TestHarness::setup();
    let decoders =
        Arc::new(FakeDecoderSource::with_cameras(&["rear"]).frames(vec![vendor_frame()]));
    let mut session = harness.scan_session(&decoders, Role::Vendor);
    session.start().await.expect("Failed to start scanner");
    session.begin_scan().await.expect("Failed to begin scan");

    session.abort_handle().abort();
    let outcome = session.next_scan().await;

    assert_eq!(outcome, ScanOutcome::Aborted);
    assert_eq!(session.phase(), ScanPhase::Stopped);
    assert_eq!(harness.ledger.calls().get_identity, 0);
    assert_eq!(decoders.outstanding(), 0);
}
