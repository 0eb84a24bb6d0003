//! Test fixtures: a simulated marking printer and fast pipeline settings

#![allow(dead_code)]

use coding_server::core::config::{PipelineConfig, PrinterSettings};
use coding_server::{MemoryCodeStore, Orchestrator, StatusBus};
use marking_printer::Transport;
use parking_lot::Mutex;
use shared::models::Product;
use shared::request::BatchRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const NOZZLE_OPENED: i64 = 1;
const NOZZLE_CLOSED: i64 = 2;
const MACHINE_STARTED: i64 = 6;
const MACHINE_IDLE: i64 = 5;

#[derive(Debug)]
pub struct PrinterState {
    pub nozzle: i64,
    pub machine: i64,
    /// Error word reported in every status line until the test clears it
    pub error: i64,
    /// `(counter, code)` of every mail record received
    pub records: Vec<(i64, String)>,
    /// Every command received, in order
    pub commands: Vec<String>,
}

/// A printer that answers the wire protocol and prints instantly
/// (its FIFO is always empty)
#[derive(Clone)]
pub struct SimulatedPrinter {
    pub addr: String,
    pub state: Arc<Mutex<PrinterState>>,
}

impl SimulatedPrinter {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(Mutex::new(PrinterState {
            nozzle: NOZZLE_CLOSED,
            machine: MACHINE_IDLE,
            error: 0,
            records: Vec::new(),
            commands: Vec::new(),
        }));

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self { addr, state }
    }

    pub fn records(&self) -> Vec<(i64, String)> {
        self.state.lock().records.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn set_error(&self, error: i64) {
        self.state.lock().error = error;
    }
}

fn answer(state: &Mutex<PrinterState>, request: &str) -> Option<String> {
    let mut state = state.lock();
    if let Some(record) = request.strip_prefix("^0=MR") {
        let (counter, code) = record.split_once('\t')?;
        state.records.push((counter.parse().ok()?, code.to_string()));
        return None;
    }

    state.commands.push(request.to_string());
    match request {
        "^0?RS" => Some(format!(
            "^0=RS{}\t{}\t{}\t0\t80\t0",
            state.nozzle, state.machine, state.error
        )),
        "^0?SM" => Some(format!("^0=SM256\t0\t{}\t0\t1", state.records.len())),
        "^0!NO" => {
            state.nozzle = NOZZLE_OPENED;
            Some(request.to_string())
        }
        "^0!GO" => {
            state.machine = MACHINE_STARTED;
            Some(request.to_string())
        }
        "^0!ST" => {
            state.machine = MACHINE_IDLE;
            Some(request.to_string())
        }
        other => Some(other.to_string()),
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<PrinterState>>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\r', &mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let request = String::from_utf8_lossy(&buf)
            .trim_end_matches('\r')
            .to_string();
        if request.is_empty() {
            continue;
        }
        if let Some(reply) = answer(&state, &request)
            && writer.write_all(format!("{reply}\r").as_bytes()).await.is_err()
        {
            return;
        }
    }
}

pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        db_poll_interval: Duration::from_millis(10),
        status_interval: Duration::from_millis(50),
        status_poll_interval: Duration::from_millis(50),
        opening_poll_delay: Duration::from_millis(10),
        stop_grace: Duration::from_millis(2000),
        command_timeout: Duration::from_millis(500),
        ..PipelineConfig::default()
    }
}

pub fn printer_settings(addr: &str) -> PrinterSettings {
    PrinterSettings {
        transport: Transport::tcp(addr),
        reconnect_interval: Duration::from_millis(100),
        response_timeout: Duration::from_millis(500),
    }
}

pub fn store_with_codes(count: usize) -> Arc<MemoryCodeStore> {
    let store = Arc::new(MemoryCodeStore::new());
    store.add_product(Product {
        id: 1,
        name: "Mineral Water 500ml".to_string(),
        barcode: "6901234567892".to_string(),
        is_active: true,
    });
    store.add_codes(1, count);
    store
}

pub fn orchestrator(store: Arc<MemoryCodeStore>, printer_addr: &str) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        store,
        printer_settings(printer_addr),
        fast_pipeline(),
        StatusBus::default(),
    ))
}

pub fn batch_request(batch_no: &str, quantity_target: i64) -> BatchRequest {
    BatchRequest {
        batch_no: batch_no.to_string(),
        product_id: Some(1),
        barcode: None,
        quantity_target,
        printer_line_id: 1,
        marking_printer_id: 1,
        user_id: 7,
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
