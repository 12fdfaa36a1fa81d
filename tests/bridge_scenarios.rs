//! End-to-end bridge scenarios on the mock platform

#![cfg(feature = "mock")]

use anx_bridge::devices::anx7625::mock::MockBridge;
use anx_bridge::devices::anx7625::registers::{FLASH_LOAD_STA, RX_P0_ADDR, RX_P2_ADDR};
use anx_bridge::devices::anx7625::{BridgeError, BridgeState, FailureReason};
use anx_bridge::display::{
    BridgeHandle, BufferSet, ExitReason, HandleConfig, LinkLossPolicy, LoopConfig, ModeId,
    PresentationLoop, StepOutcome,
};
use anx_bridge::platform::mock::{I2cTransaction, PinEvent};

const LEN: usize = 640 * 480 * 2;

#[test]
fn image_of_zeros_reaches_the_window() {
    let chip = MockBridge::healthy();
    let mut front = vec![0xFFu8; LEN];
    let mut back = vec![0xFFu8; LEN];
    let config = HandleConfig {
        background: None,
        ..HandleConfig::new(ModeId::Mode640x480At60)
    };
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        config,
        BufferSet::Double(&mut front, &mut back),
    )
    .unwrap();

    handle.begin().unwrap();
    assert_eq!(handle.state(), BridgeState::Streaming);

    let slot = handle.back_slot();
    handle.slot_mut(slot).unwrap().fill(0);
    handle.image(slot, 640, 480).unwrap();
    let report = handle.poll().unwrap();

    assert!(report.frame_complete);
    let window = chip.window_bytes();
    assert_eq!(window.len(), 640 * 480 * 2);
    assert!(window.iter().all(|&b| b == 0));
    assert_eq!(chip.commits(), 1);
}

#[test]
fn handshake_failure_leaves_lines_released() {
    let chip = MockBridge::healthy();
    chip.i2c.fail_register(RX_P0_ADDR, FLASH_LOAD_STA);
    let mut front = vec![0u8; LEN];
    let mut back = vec![0u8; LEN];
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        HandleConfig::new(ModeId::Mode640x480At60),
        BufferSet::Double(&mut front, &mut back),
    )
    .unwrap();

    let err = handle.begin().unwrap_err();
    assert!(matches!(err, BridgeError::Bus(_)));
    assert_eq!(handle.state(), BridgeState::Error(FailureReason::Bus));

    // Power came up for the handshake and went back down
    assert!(chip.power.history().contains(&PinEvent::High));
    assert!(!chip.power.output_level());
    assert!(!chip.reset.output_level());

    handle.end().unwrap();
    assert_eq!(handle.state(), BridgeState::Stopped);
}

#[test]
fn end_twice_does_no_extra_io() {
    let chip = MockBridge::healthy();
    let mut front = vec![0u8; LEN];
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        HandleConfig::new(ModeId::Mode640x480At60),
        BufferSet::Single(&mut front),
    )
    .unwrap();
    handle.begin().unwrap();

    handle.end().unwrap();
    let transactions = chip.i2c.transaction_count();
    let events = chip.power.history().len() + chip.reset.history().len() + chip.otg.history().len();

    handle.end().unwrap();
    assert_eq!(chip.i2c.transaction_count(), transactions);
    assert_eq!(
        chip.power.history().len() + chip.reset.history().len() + chip.otg.history().len(),
        events
    );
}

#[test]
fn poll_outside_streaming_does_no_io() {
    let chip = MockBridge::healthy();
    let mut front = vec![0u8; LEN];
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        HandleConfig::new(ModeId::Mode640x480At60),
        BufferSet::Single(&mut front),
    )
    .unwrap();

    assert!(matches!(
        handle.poll(),
        Err(BridgeError::InvalidState {
            state: BridgeState::Uninitialized,
            ..
        })
    ));
    assert_eq!(chip.i2c.transaction_count(), 0);

    handle.begin().unwrap();
    handle.end().unwrap();
    chip.i2c.clear_transactions();
    assert!(matches!(
        handle.poll(),
        Err(BridgeError::InvalidState {
            state: BridgeState::Stopped,
            ..
        })
    ));
    assert_eq!(chip.i2c.transaction_count(), 0);
}

#[test]
fn every_write_to_a_new_slave_is_preceded_by_the_workaround() {
    let chip = MockBridge::healthy();
    let mut front = vec![0u8; LEN];
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        HandleConfig::new(ModeId::Mode640x480At60),
        BufferSet::Single(&mut front),
    )
    .unwrap();
    handle.begin().unwrap();
    handle.poll().unwrap();

    let log = chip.i2c.transactions();
    let mut last = None;
    for (i, t) in log.iter().enumerate() {
        if last != Some(t.addr()) {
            assert!(
                matches!(t, I2cTransaction::Write { data, .. } if data.len() == 2 && data[1] == 0),
                "transaction {} to {:#x} not preceded by the workaround",
                i,
                t.addr()
            );
        }
        last = Some(t.addr());
    }
    // The frame went to the pixel window slave
    assert!(log.iter().any(|t| t.addr() == RX_P2_ADDR));
}

#[test]
fn presentation_loop_steps_until_unplug() {
    let chip = MockBridge::healthy();
    let mut front = vec![0u8; LEN];
    let mut back = vec![0u8; LEN];
    let mut handle = BridgeHandle::new(
        chip.bus().unwrap(),
        HandleConfig::new(ModeId::Mode640x480At60),
        BufferSet::Double(&mut front, &mut back),
    )
    .unwrap();
    handle.begin().unwrap();

    let mut task = PresentationLoop::new(LoopConfig {
        policy: LinkLossPolicy::Terminate,
    });
    for _ in 0..3 {
        handle.fill(0x07E0);
        handle.present();
        assert_eq!(task.step(&mut handle, &mut ()), StepOutcome::Continue);
    }
    assert_eq!(task.stats().frames, 3);

    chip.set_hpd(false);
    assert_eq!(
        task.step(&mut handle, &mut ()),
        StepOutcome::Exit(ExitReason::Failed(FailureReason::LinkLost))
    );
}
