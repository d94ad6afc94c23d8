//! Interrogation runs against a scripted controller.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use bredr_interrogator::{
    BluetoothAddress, CommandDispatcher, ConnHandle, CoreSpecificationVersion, DecodeError,
    DispatchError, EventPacket, InterrogationCommand, InterrogationError, Interrogator,
    InterrogatorOptions, LmpFeature, PeerCache, PeerId, RemoteVersion,
};
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

const HANDLE: u16 = 0x0001;
const ADDRESS: BluetoothAddress = BluetoothAddress::new([0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
const EXTENDED_FEATURES: u64 = 1 << 63;

type Cache = PeerCache<NoopRawMutex, 8>;

#[derive(Clone)]
enum Reply {
    /// Complete with `event` after yielding `delay` times
    Event(EventPacket, usize),
    /// Fail with `error` after yielding `delay` times
    Fail(DispatchError, usize),
    /// Never complete
    Hang,
}

/// Answers each command from a per-command queue; the last reply repeats
#[derive(Default)]
struct ScriptedController {
    replies: RefCell<HashMap<(u16, u8), VecDeque<Reply>>>,
    sent: RefCell<Vec<InterrogationCommand>>,
}

fn key(command: &InterrogationCommand) -> (u16, u8) {
    match command {
        InterrogationCommand::ReadRemoteExtendedFeatures { page_number, .. } => {
            (command.opcode(), *page_number)
        }
        _ => (command.opcode(), 0),
    }
}

impl ScriptedController {
    fn on(self, opcode: u16, reply: Reply) -> Self {
        self.on_page(opcode, 0, reply)
    }

    fn on_page(self, opcode: u16, page: u8, reply: Reply) -> Self {
        self.replies
            .borrow_mut()
            .entry((opcode, page))
            .or_default()
            .push_back(reply);
        self
    }

    fn sent(&self) -> Vec<InterrogationCommand> {
        self.sent.borrow().clone()
    }

    fn next_reply(&self, command: &InterrogationCommand) -> Reply {
        let mut replies = self.replies.borrow_mut();
        let queue = replies
            .get_mut(&key(command))
            .unwrap_or_else(|| panic!("unscripted command {command:?}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

impl CommandDispatcher for ScriptedController {
    async fn send_command(
        &self,
        command: InterrogationCommand,
    ) -> Result<EventPacket, DispatchError> {
        self.sent.borrow_mut().push(command);
        match self.next_reply(&command) {
            Reply::Event(event, delay) => {
                for _ in 0..delay {
                    yield_now().await;
                }
                Ok(event)
            }
            Reply::Fail(error, delay) => {
                for _ in 0..delay {
                    yield_now().await;
                }
                Err(error)
            }
            Reply::Hang => core::future::pending().await,
        }
    }
}

// Completion event builders

fn name_complete(status: u8, name: &str) -> EventPacket {
    let mut params = vec![status];
    params.extend_from_slice(ADDRESS.as_bytes());
    params.extend_from_slice(name.as_bytes());
    params.resize(255, 0);
    EventPacket::new(0x07, &params).unwrap()
}

fn version_complete(version: u8, manufacturer: u16, subversion: u16) -> EventPacket {
    let mut params = vec![0x00];
    params.extend_from_slice(&HANDLE.to_le_bytes());
    params.push(version);
    params.extend_from_slice(&manufacturer.to_le_bytes());
    params.extend_from_slice(&subversion.to_le_bytes());
    EventPacket::new(0x0C, &params).unwrap()
}

fn features_complete(bits: u64) -> EventPacket {
    let mut params = vec![0x00];
    params.extend_from_slice(&HANDLE.to_le_bytes());
    params.extend_from_slice(&bits.to_le_bytes());
    EventPacket::new(0x0B, &params).unwrap()
}

fn extended_features_complete(page: u8, max_page: u8, bits: u64) -> EventPacket {
    let mut params = vec![0x00];
    params.extend_from_slice(&HANDLE.to_le_bytes());
    params.push(page);
    params.push(max_page);
    params.extend_from_slice(&bits.to_le_bytes());
    EventPacket::new(0x23, &params).unwrap()
}

fn status_only(code: u8, status: u8) -> EventPacket {
    EventPacket::new(code, &[status]).unwrap()
}

const REMOTE_NAME_REQUEST: u16 = 0x0419;
const READ_REMOTE_SUPPORTED_FEATURES: u16 = 0x041B;
const READ_REMOTE_EXTENDED_FEATURES: u16 = 0x041C;
const READ_REMOTE_VERSION_INFORMATION: u16 = 0x041D;

/// A peer reporting name, version 5.1 and no extended features
fn basic_controller(name: &str) -> ScriptedController {
    controller_with_name(Reply::Event(name_complete(0x00, name), 0))
}

fn controller_with_name(name: Reply) -> ScriptedController {
    ScriptedController::default()
        .on(REMOTE_NAME_REQUEST, name)
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Event(version_complete(0x0A, 0x000F, 0x1234), 0),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Event(features_complete(0x0000_0000_0000_00FF), 0),
        )
}

/// A peer with feature pages 0..=2
fn extended_controller() -> ScriptedController {
    ScriptedController::default()
        .on(REMOTE_NAME_REQUEST, Reply::Event(name_complete(0x00, "Headset"), 0))
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Event(version_complete(0x09, 0x0002, 0x0100), 0),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Event(features_complete(EXTENDED_FEATURES | 0xFF), 0),
        )
        .on_page(
            READ_REMOTE_EXTENDED_FEATURES,
            1,
            Reply::Event(extended_features_complete(1, 2, 0x0F), 0),
        )
        .on_page(
            READ_REMOTE_EXTENDED_FEATURES,
            2,
            Reply::Event(extended_features_complete(2, 2, 0x0300), 0),
        )
}

fn handle() -> ConnHandle {
    ConnHandle::new(HANDLE)
}

/// Run one interrogation to completion and return every callback result
fn run_once(
    cache: &Cache,
    controller: &ScriptedController,
    options: InterrogatorOptions,
    peer: PeerId,
) -> Vec<Result<(), InterrogationError>> {
    let interrogator = Interrogator::new(cache, controller, options);
    let results = RefCell::new(Vec::new());
    block_on(interrogator.start(peer, handle(), |result| {
        results.borrow_mut().push(result);
    }));
    assert!(!interrogator.is_interrogating(peer));
    results.into_inner()
}

#[test]
fn interrogation_reads_name_version_and_all_feature_pages() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = extended_controller();

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Ok(())]);

    let sent = controller.sent();
    assert_eq!(sent.len(), 5);
    assert_eq!(
        sent[3],
        InterrogationCommand::ReadRemoteExtendedFeatures {
            handle: handle(),
            page_number: 1
        }
    );
    assert_eq!(
        sent[4],
        InterrogationCommand::ReadRemoteExtendedFeatures {
            handle: handle(),
            page_number: 2
        }
    );

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), Some("Headset"));
    assert_eq!(
        record.version(),
        Some(RemoteVersion {
            version: CoreSpecificationVersion::VERSION_5_0,
            manufacturer: 0x0002,
            subversion: 0x0100,
        })
    );
    assert_eq!(record.features().page(0), Some(EXTENDED_FEATURES | 0xFF));
    assert_eq!(record.features().page(1), Some(0x0F));
    assert_eq!(record.features().page(2), Some(0x0300));
    assert_eq!(record.features().last_page_number(), 2);
    assert!(record.features().has_feature(LmpFeature::SECURE_CONNECTIONS_HOST));
    assert!(record.features().has_feature(LmpFeature::PING));
}

#[test]
fn interrogation_without_extended_bit_sends_three_commands() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = basic_controller("Keyboard");

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Ok(())]);

    let opcodes: Vec<u16> = controller.sent().iter().map(InterrogationCommand::opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            REMOTE_NAME_REQUEST,
            READ_REMOTE_VERSION_INFORMATION,
            READ_REMOTE_SUPPORTED_FEATURES
        ]
    );

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), Some("Keyboard"));
    assert_eq!(record.features().page(1), None);
    assert_eq!(record.features().last_page_number(), 0);
}

#[test]
fn malformed_name_event_fails_run_but_keeps_other_results() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();

    let mut short_name = vec![0x00];
    short_name.extend_from_slice(ADDRESS.as_bytes());
    short_name.push(b'F');
    let controller = ScriptedController::default()
        .on(
            REMOTE_NAME_REQUEST,
            Reply::Event(EventPacket::new(0x07, &short_name).unwrap(), 0),
        )
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Event(version_complete(0x0A, 0x000F, 0x1234), 0),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Event(features_complete(0xFF), 0),
        );

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(
        results,
        vec![Err(InterrogationError::Malformed(
            DecodeError::InsufficientData {
                expected: 255,
                actual: 8
            }
        ))]
    );

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), None);
    assert!(record.version().is_some());
    assert_eq!(record.features().page(0), Some(0xFF));
}

#[test]
fn controller_failure_on_name_request_is_reported() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = controller_with_name(Reply::Event(status_only(0x07, 0x04), 0));

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Err(InterrogationError::Controller(0x04))]);

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), None);
    assert!(record.version().is_some());
    assert_eq!(record.features().page(0), Some(0xFF));
}

#[test]
fn first_failure_wins_regardless_of_issue_order() {
    let scripted = |name_delay, version_delay| {
        ScriptedController::default()
            .on(
                REMOTE_NAME_REQUEST,
                Reply::Event(status_only(0x07, 0x04), name_delay),
            )
            .on(
                READ_REMOTE_VERSION_INFORMATION,
                Reply::Fail(DispatchError::Transport, version_delay),
            )
            .on(
                READ_REMOTE_SUPPORTED_FEATURES,
                Reply::Event(features_complete(0xFF), 1),
            )
    };

    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();

    let results = run_once(&cache, &scripted(0, 3), InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Err(InterrogationError::Controller(0x04))]);

    let results = run_once(&cache, &scripted(3, 0), InterrogatorOptions::default(), peer);
    assert_eq!(
        results,
        vec![Err(InterrogationError::Dispatch(DispatchError::Transport))]
    );

    // Page 0 arrived in both runs despite the failures
    assert_eq!(cache.peer(peer).unwrap().features().page(0), Some(0xFF));
}

#[test]
fn completion_order_does_not_change_the_record() {
    let delays = [(0, 1, 2), (2, 1, 0), (1, 2, 0), (0, 0, 0)];
    let mut snapshots = Vec::new();

    for (name_delay, version_delay, features_delay) in delays {
        let cache = Cache::new();
        let peer = cache.new_peer(ADDRESS).unwrap();
        let controller = ScriptedController::default()
            .on(
                REMOTE_NAME_REQUEST,
                Reply::Event(name_complete(0x00, "Speaker"), name_delay),
            )
            .on(
                READ_REMOTE_VERSION_INFORMATION,
                Reply::Event(version_complete(0x0B, 0x001D, 0x0042), version_delay),
            )
            .on(
                READ_REMOTE_SUPPORTED_FEATURES,
                Reply::Event(features_complete(EXTENDED_FEATURES), features_delay),
            )
            .on_page(
                READ_REMOTE_EXTENDED_FEATURES,
                1,
                Reply::Event(extended_features_complete(1, 1, 0x01), 1),
            );

        let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
        assert_eq!(results, vec![Ok(())]);
        assert_eq!(controller.sent().len(), 4);
        snapshots.push(cache.peer(peer).unwrap());
    }

    assert!(snapshots.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn refresh_overwrites_previous_results() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();

    run_once(&cache, &basic_controller("Old Name"), InterrogatorOptions::default(), peer);
    assert_eq!(cache.peer(peer).unwrap().name(), Some("Old Name"));

    let renamed = ScriptedController::default()
        .on(REMOTE_NAME_REQUEST, Reply::Event(name_complete(0x00, "New Name"), 0))
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Event(version_complete(0x0C, 0x000F, 0x2000), 0),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Event(features_complete(0xFF), 0),
        );
    let results = run_once(&cache, &renamed, InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Ok(())]);

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), Some("New Name"));
    assert_eq!(
        record.version().unwrap().version,
        CoreSpecificationVersion::VERSION_5_3
    );
    assert_eq!(record.version().unwrap().core_specification(), "5.3");
}

#[test]
fn repeated_interrogation_is_idempotent() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = extended_controller();

    run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    let first = cache.peer(peer).unwrap();
    run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    let second = cache.peer(peer).unwrap();

    assert_eq!(first, second);
    assert_eq!(controller.sent().len(), 10);
}

#[test]
fn disconnect_fails_every_command_and_reports_once() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = ScriptedController::default()
        .on(REMOTE_NAME_REQUEST, Reply::Fail(DispatchError::Disconnected, 2))
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Fail(DispatchError::Disconnected, 2),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Fail(DispatchError::Disconnected, 2),
        );

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(
        results,
        vec![Err(InterrogationError::Dispatch(DispatchError::Disconnected))]
    );

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.name(), None);
    assert_eq!(record.version(), None);
    assert!(!record.features().has_page(0));
}

#[test]
fn failed_extended_page_stops_the_page_sequence() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = extended_controller();
    controller
        .replies
        .borrow_mut()
        .insert(
            (READ_REMOTE_EXTENDED_FEATURES, 2),
            VecDeque::from([Reply::Event(status_only(0x23, 0x1A), 0)]),
        );

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), peer);
    assert_eq!(results, vec![Err(InterrogationError::Controller(0x1A))]);

    let record = cache.peer(peer).unwrap();
    assert_eq!(record.features().page(1), Some(0x0F));
    assert_eq!(record.features().page(2), None);
    assert_eq!(record.features().last_page_number(), 2);
}

#[test]
fn extended_page_limit_and_switch_are_honoured() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();

    let controller = extended_controller();
    let page_one_only = InterrogatorOptions {
        max_extended_page: 1,
        ..InterrogatorOptions::default()
    };
    assert_eq!(run_once(&cache, &controller, page_one_only, peer), vec![Ok(())]);
    assert_eq!(controller.sent().len(), 4);
    // The peer still claims page 2
    assert_eq!(cache.peer(peer).unwrap().features().last_page_number(), 2);

    let controller = extended_controller();
    let no_extended = InterrogatorOptions {
        read_extended_features: false,
        ..InterrogatorOptions::default()
    };
    assert_eq!(run_once(&cache, &controller, no_extended, peer), vec![Ok(())]);
    assert_eq!(controller.sent().len(), 3);
}

#[test]
fn name_request_uses_page_scan_info_from_inquiry() {
    let cache = Cache::new();
    let known = cache
        .new_peer_with_page_scan_info(ADDRESS, 0x02, 0x1234)
        .unwrap();
    let controller = basic_controller("Mouse");
    run_once(&cache, &controller, InterrogatorOptions::default(), known);
    assert_eq!(
        controller.sent()[0].parameters().as_slice(),
        &[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x34, 0x92]
    );

    // A later inquiry result refreshes the paging parameters
    cache
        .update(known, |record| record.set_page_scan_info(0x00, 0x0456))
        .unwrap();
    let controller = basic_controller("Mouse");
    run_once(&cache, &controller, InterrogatorOptions::default(), known);
    assert_eq!(
        controller.sent()[0].parameters().as_slice(),
        &[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x56, 0x84]
    );

    let other = BluetoothAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x00]);
    let fresh = cache.new_peer(other).unwrap();
    let controller = ScriptedController::default()
        .on(REMOTE_NAME_REQUEST, Reply::Fail(DispatchError::Transport, 0))
        .on(
            READ_REMOTE_VERSION_INFORMATION,
            Reply::Event(version_complete(0x0A, 0x000F, 0x1234), 0),
        )
        .on(
            READ_REMOTE_SUPPORTED_FEATURES,
            Reply::Event(features_complete(0xFF), 0),
        );
    run_once(&cache, &controller, InterrogatorOptions::default(), fresh);
    assert_eq!(
        controller.sent()[0],
        InterrogationCommand::RemoteNameRequest {
            bd_addr: other,
            page_scan_repetition_mode: 0x01,
            clock_offset: 0x0000,
        }
    );
}

#[test]
fn unknown_peer_fails_without_sending_commands() {
    let cache = Cache::new();
    let controller = basic_controller("unused");

    let results = run_once(&cache, &controller, InterrogatorOptions::default(), PeerId(99));
    assert_eq!(results, vec![Err(InterrogationError::PeerNotFound)]);
    assert!(controller.sent().is_empty());
}

#[test]
fn peer_removed_mid_run_reports_peer_not_found() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = controller_with_name(Reply::Event(name_complete(0x00, "Gone"), 5));

    let interrogator = Interrogator::new(&cache, &controller, InterrogatorOptions::default());
    let result = Cell::new(None);
    block_on(join(
        interrogator.start(peer, handle(), |r| result.set(Some(r))),
        async {
            yield_now().await;
            assert!(cache.remove(peer).is_some());
        },
    ));

    assert_eq!(result.get(), Some(Err(InterrogationError::PeerNotFound)));
}

#[test]
fn cancel_drops_outstanding_commands() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    let controller = controller_with_name(Reply::Hang);

    let interrogator = Interrogator::new(&cache, &controller, InterrogatorOptions::default());
    let calls = Cell::new(0);
    let result = Cell::new(None);
    block_on(join(
        interrogator.start(peer, handle(), |r| {
            calls.set(calls.get() + 1);
            result.set(Some(r));
        }),
        async {
            yield_now().await;
            assert!(interrogator.is_interrogating(peer));
            assert!(interrogator.cancel(peer));
        },
    ));

    assert_eq!(calls.get(), 1);
    assert_eq!(result.get(), Some(Err(InterrogationError::Canceled)));
    assert!(!interrogator.is_interrogating(peer));
    assert!(!interrogator.cancel(peer));

    // Results that arrived before the cancel are kept
    assert!(cache.peer(peer).unwrap().version().is_some());
}

#[test]
fn restart_supersedes_the_running_interrogation() {
    let cache = Cache::new();
    let peer = cache.new_peer(ADDRESS).unwrap();
    // The first run hangs on its name request, the second gets an answer
    let controller = controller_with_name(Reply::Hang).on(
        REMOTE_NAME_REQUEST,
        Reply::Event(name_complete(0x00, "Second"), 0),
    );

    let interrogator = Interrogator::new(&cache, &controller, InterrogatorOptions::default());
    let first = Cell::new(None);
    let second = Cell::new(None);
    block_on(join(
        interrogator.start(peer, handle(), |r| first.set(Some(r))),
        async {
            yield_now().await;
            interrogator
                .start(peer, handle(), |r| second.set(Some(r)))
                .await;
        },
    ));

    assert_eq!(first.get(), Some(Err(InterrogationError::Canceled)));
    assert_eq!(second.get(), Some(Ok(())));
    assert_eq!(cache.peer(peer).unwrap().name(), Some("Second"));
    assert_eq!(controller.sent().len(), 6);
}

#[test]
fn peers_are_interrogated_concurrently() {
    let cache = Cache::new();
    let first = cache.new_peer(ADDRESS).unwrap();
    let second = cache
        .new_peer(BluetoothAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x00]))
        .unwrap();
    // Both peers answer to the same address in this script; only the first name matches
    let controller = basic_controller("First");

    let interrogator = Interrogator::new(&cache, &controller, InterrogatorOptions::default());
    let (a, b) = block_on(join(
        interrogator.interrogate(first, handle()),
        interrogator.interrogate(second, handle()),
    ));

    assert_eq!(a, Ok(()));
    assert_eq!(
        b,
        Err(InterrogationError::Malformed(DecodeError::AddressMismatch))
    );
    assert_eq!(cache.peer(first).unwrap().name(), Some("First"));
    assert_eq!(cache.peer(second).unwrap().name(), None);
    assert!(cache.peer(second).unwrap().version().is_some());
}

#[test]
fn hung_peer_does_not_block_another_peer() {
    let cache = Cache::new();
    let first = cache
        .new_peer(BluetoothAddress::new([0x09, 0x00, 0x00, 0x00, 0x00, 0x00]))
        .unwrap();
    for filler in 2..5u8 {
        cache
            .new_peer(BluetoothAddress::new([filler, 0x00, 0x00, 0x00, 0x00, 0x01]))
            .unwrap();
    }
    let fifth = cache.new_peer(ADDRESS).unwrap();
    assert_eq!((first, fifth), (PeerId(1), PeerId(5)));

    // The first name request hangs, the second is answered
    let controller = controller_with_name(Reply::Hang).on(
        REMOTE_NAME_REQUEST,
        Reply::Event(name_complete(0x00, "Fifth"), 0),
    );

    let interrogator = Interrogator::new(&cache, &controller, InterrogatorOptions::default());
    let first_result = Cell::new(None);
    let fifth_result = Cell::new(None);
    block_on(join(
        interrogator.start(first, handle(), |r| first_result.set(Some(r))),
        async {
            yield_now().await;
            assert!(interrogator.is_interrogating(first));
            interrogator
                .start(fifth, handle(), |r| fifth_result.set(Some(r)))
                .await;

            // The fifth peer finished while the first is still stuck
            assert!(interrogator.is_interrogating(first));
            assert!(first_result.get().is_none());
            assert!(interrogator.cancel(first));
        },
    ));

    assert_eq!(fifth_result.get(), Some(Ok(())));
    assert_eq!(first_result.get(), Some(Err(InterrogationError::Canceled)));
    assert_eq!(cache.peer(fifth).unwrap().name(), Some("Fifth"));
    assert_eq!(cache.peer(first).unwrap().name(), None);
    assert!(!interrogator.is_interrogating(first));
    assert!(!interrogator.is_interrogating(fifth));
}
