use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use uart_alu::{
    display::DisplaySink,
    mock::MockPort,
    receiver::{self, RxPhase},
    run_state::{ReadySignal, RunPhase, RunState},
};

mod common;
use common::{RecordingSurface, Shown};

const INTERVAL: Duration = Duration::from_millis(20);

fn wait_for_phase(handle: &receiver::ReceiverHandle, phase: RxPhase) -> Result<()> {
    let start = Instant::now();

    while handle.phase() != phase {
        if start.elapsed() > Duration::from_secs(5) {
            color_eyre::eyre::bail!("Receive loop never reached {phase}");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    Ok(())
}

#[tokio::test]
async fn received_bytes_are_shown() -> Result<()> {
    uart_alu::logging::init(None).await;

    let port = Arc::new(MockPort::new("mock"));
    let monitor = port.monitor();
    let (surface, recording) = RecordingSurface::new();
    let display = Arc::new(DisplaySink::new(surface));
    let run_state = RunState::new();
    let ready = ReadySignal::new();

    monitor.push_inbound(&[0x01, 0xFF]);

    let handle = receiver::spawn_with_interval(
        port,
        display,
        run_state.clone(),
        ready.clone(),
        INTERVAL,
    )?;
    ready.signal();

    let received = recording.wait_for_received(2, Duration::from_secs(5))?;
    assert_eq!(received, vec![0x01, 0xFF]);

    run_state.request_stop();
    assert_eq!(handle.join()?, RxPhase::Stopped);

    // The receive loop never changes the run state itself.
    assert_eq!(run_state.phase(), RunPhase::StopRequested);

    Ok(())
}

#[tokio::test]
async fn nothing_is_read_before_ready() -> Result<()> {
    uart_alu::logging::init(None).await;

    let port = Arc::new(MockPort::new("mock"));
    let monitor = port.monitor();
    let (surface, _recording) = RecordingSurface::new();
    let display = Arc::new(DisplaySink::new(surface));
    let run_state = RunState::new();
    let ready = ReadySignal::new();

    let handle = receiver::spawn_with_interval(
        port,
        display,
        run_state.clone(),
        ready.clone(),
        INTERVAL,
    )?;

    std::thread::sleep(INTERVAL * 3);
    assert_eq!(handle.phase(), RxPhase::WaitingForReady);
    assert_eq!(monitor.reads(), 0);

    ready.signal();
    wait_for_phase(&handle, RxPhase::Polling)?;

    run_state.request_stop();
    handle.join()?;

    Ok(())
}

#[tokio::test]
async fn stop_while_waiting_for_ready() -> Result<()> {
    uart_alu::logging::init(None).await;

    let port = Arc::new(MockPort::new("mock"));
    let monitor = port.monitor();
    let (surface, _recording) = RecordingSurface::new();
    let display = Arc::new(DisplaySink::new(surface));
    let run_state = RunState::new();

    let handle = receiver::spawn_with_interval(
        port,
        display,
        run_state.clone(),
        ReadySignal::new(),
        INTERVAL,
    )?;

    run_state.request_stop();

    assert_eq!(handle.join()?, RxPhase::Stopped);
    assert_eq!(monitor.reads(), 0);

    Ok(())
}

#[tokio::test]
async fn stop_while_polling_is_noticed_within_an_interval() -> Result<()> {
    uart_alu::logging::init(None).await;

    let interval = Duration::from_millis(100);

    let port = Arc::new(MockPort::new("mock"));
    let monitor = port.monitor();
    let (surface, _recording) = RecordingSurface::new();
    let display = Arc::new(DisplaySink::new(surface));
    let run_state = RunState::new();
    let ready = ReadySignal::new();

    let handle =
        receiver::spawn_with_interval(port, display, run_state.clone(), ready.clone(), interval)?;
    ready.signal();
    wait_for_phase(&handle, RxPhase::Polling)?;

    let start = Instant::now();
    run_state.request_stop();
    let reads_at_stop = monitor.reads();

    assert_eq!(handle.join()?, RxPhase::Stopped);

    // One interval plus scheduling slack.
    assert!(start.elapsed() < interval * 3);

    // At most the read that was already underway when stop was requested.
    assert!(monitor.reads() <= reads_at_stop + 1);

    Ok(())
}

#[tokio::test]
async fn read_errors_are_shown_and_survived() -> Result<()> {
    uart_alu::logging::init(None).await;

    let port = Arc::new(MockPort::new("mock"));
    let monitor = port.monitor();
    let (surface, recording) = RecordingSurface::new();
    let display = Arc::new(DisplaySink::new(surface));
    let run_state = RunState::new();
    let ready = ReadySignal::new();

    monitor.fail_reads(true);

    let handle = receiver::spawn_with_interval(
        port,
        display,
        run_state.clone(),
        ready.clone(),
        INTERVAL,
    )?;
    ready.signal();

    let start = Instant::now();
    while !recording
        .shown()
        .iter()
        .any(|shown| matches!(shown, Shown::Status(status) if status.contains("read error")))
    {
        if start.elapsed() > Duration::from_secs(5) {
            color_eyre::eyre::bail!("No read error was shown");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    // The loop carries on, and picks up bytes once reads work again.
    assert_eq!(handle.phase(), RxPhase::Polling);

    monitor.fail_reads(false);
    monitor.push_inbound(&[0x42]);
    assert_eq!(
        recording.wait_for_received(1, Duration::from_secs(5))?,
        vec![0x42]
    );

    run_state.request_stop();
    handle.join()?;

    Ok(())
}
