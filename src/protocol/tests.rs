// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::SessionConfig;
use crate::core::pdu::{Fields, Pdu, RESPONSE_BIT};
use crate::error::ProtocolError;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::registry::{CommandDescriptor, Registry, TlvDescriptor, TlvKind};
use crate::session::{Role, Session};

#[test]
fn test_smpp_registry_pairs_requests_with_responses() {
    let registry = Registry::smpp();

    let submit = registry.command("submit_sm").unwrap();
    let submit_resp = registry.command("submit_sm_resp").unwrap();
    assert_eq!(submit.id, 0x0000_0004);
    assert_eq!(submit_resp.id, 0x0000_0004 | RESPONSE_BIT);
    assert!(submit_resp.is_response());

    // Notifications have no response
    assert!(registry.has_command("outbind"));
    assert!(!registry.has_command("outbind_resp"));
    assert_eq!(registry.command_name(0x8000_0000).as_deref(), Some("generic_nack"));
}

#[test]
fn test_register_command_auto_registers_response() {
    let registry = Registry::empty();
    registry
        .register_command("vendor_ping", CommandDescriptor::new(0x0001_0001))
        .unwrap();

    assert_eq!(
        registry.command("vendor_ping_resp").unwrap().id,
        0x0001_0001 | RESPONSE_BIT
    );
    assert_eq!(registry.command_name(0x8001_0001).as_deref(), Some("vendor_ping_resp"));
}

#[test]
fn test_register_command_keeps_explicit_response() {
    let registry = Registry::empty();
    registry
        .register_command("vendor_ping_resp", CommandDescriptor::new(0x8001_0009))
        .unwrap();
    registry
        .register_command("vendor_ping", CommandDescriptor::new(0x0001_0001))
        .unwrap();

    assert_eq!(registry.command("vendor_ping_resp").unwrap().id, 0x8001_0009);
}

#[test]
fn test_registrations_are_shared_between_clones() {
    let registry = Registry::smpp();
    let clone = registry.clone();
    clone
        .register_tlv("vendor_flag", TlvDescriptor::new(0x1400, TlvKind::Int8))
        .unwrap();

    assert_eq!(registry.tlv_name(0x1400).as_deref(), Some("vendor_flag"));
    assert!(Registry::smpp().tlv("vendor_flag").is_none());
}

#[test]
fn test_build_encodes_tlvs_and_header_fields() {
    let registry = Registry::smpp();
    let fields = Fields::new()
        .with("sequence_number", 42u32)
        .with("command_status", 8u32)
        .with("source_port", 0x1234u16)
        .with("receipted_message_id", "abc");

    let pdu = registry.build("deliver_sm_resp", &fields).unwrap();
    assert_eq!(pdu.sequence_number, 42);
    assert_eq!(pdu.command_status, 8);
    assert_eq!(pdu.param("source_port").unwrap().as_ref(), &[0x12, 0x34]);
    assert_eq!(pdu.param_str("receipted_message_id"), Some("abc"));
}

#[test]
fn test_build_rejects_bad_input() {
    let registry = Registry::smpp();

    assert!(matches!(
        registry.build("no_such_command", &Fields::new()),
        Err(ProtocolError::UnknownCommand(_))
    ));
    assert!(matches!(
        registry.build("submit_sm", &Fields::new().with("no_such_field", 1u32)),
        Err(ProtocolError::UnknownField { .. })
    ));
    assert!(matches!(
        registry.build("submit_sm", &Fields::new().with("source_port", 70_000u32)),
        Err(ProtocolError::FieldType { .. })
    ));
    assert!(matches!(
        registry.build("submit_sm", &Fields::new().with("sequence_number", "one")),
        Err(ProtocolError::FieldType { .. })
    ));
}

#[test]
fn test_command_param_whitelist() {
    let registry = Registry::empty();
    registry
        .register_tlv("vendor_flag", TlvDescriptor::new(0x1400, TlvKind::Int8))
        .unwrap();
    registry
        .register_tlv("vendor_text", TlvDescriptor::new(0x1401, TlvKind::CString))
        .unwrap();
    registry
        .register_command(
            "vendor_cmd",
            CommandDescriptor::new(0x0001_0002).with_params(["vendor_flag"]),
        )
        .unwrap();

    assert!(registry
        .build("vendor_cmd", &Fields::new().with("vendor_flag", 1u8))
        .is_ok());
    assert!(matches!(
        registry.build("vendor_cmd", &Fields::new().with("vendor_text", "x")),
        Err(ProtocolError::UnknownField { .. })
    ));
}

#[test]
fn test_builder_sees_later_redefinition() {
    let registry = Registry::empty();
    registry
        .register_command("vendor_cmd", CommandDescriptor::new(0x0001_0003))
        .unwrap();
    let builder = registry.builder("vendor_cmd").unwrap();

    registry
        .register_command("vendor_cmd", CommandDescriptor::new(0x0001_0004))
        .unwrap();
    assert_eq!(builder(&Fields::new()).unwrap().command_id, 0x0001_0004);
    assert!(registry.builder("missing").is_err());
}

#[test]
fn test_response_to_copies_sequence_number() {
    let registry = Registry::smpp();
    let request = registry
        .build("enquire_link", &Fields::new())
        .unwrap()
        .with_sequence_number(77);

    let response = registry.response_to(&request, &Fields::new()).unwrap();
    assert_eq!(response.command, "enquire_link_resp");
    assert_eq!(response.sequence_number, 77);
    assert!(response.is_response());
}

fn dispatch_session() -> Session {
    Session::new(Role::Server, Registry::smpp(), &SessionConfig::default())
}

#[test]
fn test_dispatch_runs_generic_handlers_first() {
    let dispatcher = Dispatcher::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let seen = order.clone();
    dispatcher
        .register("submit_sm", move |_, _| seen.lock().unwrap().push("submit_sm"))
        .unwrap();
    let seen = order.clone();
    dispatcher
        .register_any(move |_, _| seen.lock().unwrap().push("any"))
        .unwrap();

    let session = dispatch_session();
    dispatcher.dispatch(&session, &Pdu::new("submit_sm", 0x04));
    dispatcher.dispatch(&session, &Pdu::new("enquire_link", 0x15));

    assert_eq!(*order.lock().unwrap(), vec!["any", "submit_sm", "any"]);
    assert_eq!(dispatcher.handler_count("submit_sm"), 2);
    assert_eq!(dispatcher.handler_count("enquire_link"), 1);
}

#[test]
fn test_handler_may_register_more_handlers() {
    let dispatcher = Arc::new(Dispatcher::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let inner = dispatcher.clone();
    let counter = calls.clone();
    dispatcher
        .register("unbind", move |_, _| {
            let counter = counter.clone();
            inner
                .register("unbind", move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        })
        .unwrap();

    let session = dispatch_session();
    dispatcher.dispatch(&session, &Pdu::new("unbind", 0x06));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    dispatcher.dispatch(&session, &Pdu::new("unbind", 0x06));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
