//! Marking Printer Worker
//!
//! 由打码机状态行驱动的状态机：每收到一条 `=RS` 状态行，按固定优先级
//! 判断下一步动作（停止 > 错误 > 喷嘴 > 启动 > 首次运行 > 补码）。
//! `=SM` 邮件状态行触发补码：把已确认的码交给数据库工作者，再从待打印
//! 队列取码下发给打码机。

use crate::core::config::PipelineConfig;
use crate::db::CodeStore;
use crate::pipeline::SharedBuffers;
use marking_printer::protocol::{
    self, ADDRESS_PREFIX, Command, MailingStatus, PrinterStatus, Response,
};
use marking_printer::{DeviceLink, RequestOptions, ResponseMatcher};
use shared::util::now_millis;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

pub const STOP_PRINTING_MESSAGE: &str = "STOP PRINTING";
pub const OPENING_NOZZLE_MESSAGE: &str = "OPENING NOZZLE";

/// 打码机工作者
///
/// 只对外暴露三个生命周期操作：[`init`](Self::init)、[`run`](Self::run)、
/// [`batch_start`](Self::batch_start)。
pub struct PrinterWorker<L: DeviceLink> {
    buffers: SharedBuffers,
    link: Arc<L>,
    store: Arc<dyn CodeStore>,
    config: PipelineConfig,
    /// 批次开始后的第一次 STARTED 状态
    first_run: AtomicBool,
}

impl<L: DeviceLink + 'static> PrinterWorker<L> {
    /// 绑定编排器的共享单元/队列和设备连接
    pub fn init(
        buffers: SharedBuffers,
        link: Arc<L>,
        store: Arc<dyn CodeStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            buffers,
            link,
            store,
            config,
            first_run: AtomicBool::new(false),
        }
    }

    /// 新批次：计数归零并标记首次运行
    pub fn batch_start(&self) {
        self.buffers.print_counter.set(0i64);
        self.first_run.store(true, Ordering::SeqCst);
        tracing::debug!("Printer worker armed for a new batch");
    }

    /// 运行直到停止完成
    ///
    /// 先重置设备计数并查询一次状态，之后由设备返回的状态行推动状态机。
    /// 空闲超过 `status_poll_interval` 会重新查询状态。停止后，遮码分支
    /// 完成或 `stop_grace` 到期即退出。
    pub async fn run(&self) {
        tracing::info!("Printer worker started");
        let mut lines = self.link.subscribe();
        self.buffers.is_printer_finished.set(false);

        self.send(Command::ResetCounters).await;
        self.send(Command::QueryStatus).await;

        let mut stop_deadline: Option<Instant> = None;
        loop {
            if self.buffers.is_printer_finished.get_bool() {
                break;
            }
            if !self.buffers.is_printing() {
                let deadline =
                    *stop_deadline.get_or_insert_with(|| Instant::now() + self.config.stop_grace);
                if Instant::now() >= deadline {
                    tracing::warn!("Printer did not confirm stop in time, leaving anyway");
                    break;
                }
            }

            match tokio::time::timeout(self.config.status_poll_interval, lines.recv()).await {
                Ok(Ok(line)) => self.on_data(&line).await,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Printer worker lagged behind device lines");
                }
                Ok(Err(RecvError::Closed)) => {
                    tracing::warn!("Device line stream closed");
                    break;
                }
                Err(_) => self.send(Command::QueryStatus).await,
            }
        }
        tracing::info!("Printer worker stopped");
    }

    /// 处理一条设备行
    async fn on_data(&self, line: &str) {
        match protocol::classify(line) {
            Ok(Response::PrinterStatus(status)) => self.handle_printer_status(&status).await,
            Ok(Response::MailingStatus(status)) => self.handle_mailing_status(&status).await,
            Ok(Response::Message(text)) => self.handle_device_message(&text).await,
            Ok(Response::Ack(_)) | Ok(Response::Empty) => {}
            Err(e) => {
                tracing::warn!(line = %line.escape_debug(), error = %e, "Malformed status line");
            }
        }
    }

    async fn handle_printer_status(&self, status: &PrinterStatus) {
        let device = &self.config.device;

        if !self.buffers.is_printing() {
            self.buffers.display_message.set(STOP_PRINTING_MESSAGE);
            if status.machine_state == device.machine_started {
                tracing::info!("Stopping printer");
                self.send(Command::StopPrint).await;
                self.send(Command::QueryStatus).await;
            } else {
                self.send(Command::ShowDisplay).await;
                let counter = self.buffers.print_counter.add_i64(1);
                self.link
                    .write(&protocol::mail_record(counter, &self.config.masked_code))
                    .await;
                self.buffers.is_printer_finished.set(true);
                tracing::info!(counter, "Printer stopped, masked placeholder sent");
            }
            return;
        }

        if status.error_state != 0 {
            self.handle_device_error(status.error_state).await;
            self.send(Command::CloseError).await;
            self.send(Command::QueryStatus).await;
            return;
        }

        if status.nozzle_state == device.nozzle_closed
            || status.nozzle_state == device.nozzle_closing
        {
            self.send(Command::OpenNozzle).await;
            self.buffers.display_message.set(OPENING_NOZZLE_MESSAGE);
            self.send(Command::QueryStatus).await;
            return;
        }

        if status.nozzle_state == device.nozzle_opening {
            self.buffers.display_message.set(OPENING_NOZZLE_MESSAGE);
            tokio::time::sleep(self.config.opening_poll_delay).await;
            self.send(Command::QueryStatus).await;
            return;
        }

        let started = status.machine_state == device.machine_started;
        if status.nozzle_state == device.nozzle_opened && !started {
            self.send(Command::StartPrint).await;
            self.send(Command::QueryStatus).await;
            return;
        }

        if !started {
            // 未知喷嘴状态：等空闲轮询再查
            tracing::debug!(nozzle = status.nozzle_state, "Waiting for printer");
            return;
        }

        if self.first_run.swap(false, Ordering::SeqCst) {
            self.send(Command::FlushFifo).await;
            self.send(Command::HideDisplay).await;
            tracing::info!("Printer started");
            return;
        }

        self.send(Command::QueryMailing).await;
        self.send(Command::QueryStatus).await;
    }

    /// 非零错误码：不可跳过的错误写入显示消息
    async fn handle_device_error(&self, code: i64) {
        let known = match self.store.find_error_code_by_code(code).await {
            Ok(known) => known,
            Err(e) => {
                tracing::error!(code, error = %e, "Failed to look up device error code");
                None
            }
        };

        match known {
            None => {
                tracing::warn!(code, "Unidentified device error");
                self.buffers
                    .display_message
                    .set(format!("Unidentified Error Code: {code}"));
            }
            Some(error) => {
                let skippable =
                    error.skippable || self.config.skippable_error_codes.contains(&code);
                if skippable {
                    tracing::debug!(code, name = %error.name, "Skipping device error");
                } else {
                    tracing::warn!(code, name = %error.name, "Device error");
                    self.buffers.display_message.set(error.name);
                }
            }
        }
    }

    async fn handle_mailing_status(&self, status: &MailingStatus) {
        let refill = (self.config.max_printed_queue_size as i64 - status.fifo_entries + 1).max(0)
            as usize;
        if refill == 0 {
            return;
        }

        // 设备已接收的码：交给数据库工作者落库
        let confirmed = self.buffers.printed_queue.shift_up_to(refill);
        if !confirmed.is_empty() {
            let count = confirmed.len();
            if let Err(full) = self.buffers.db_update_queue.push(confirmed) {
                tracing::warn!(
                    rejected = full.rejected.len(),
                    "DB update queue full, keeping codes in flight"
                );
                if let Err(lost) = self.buffers.printed_queue.push(full.rejected) {
                    tracing::error!(lost = lost.rejected.len(), "Dropped confirmed codes");
                }
            } else {
                tracing::trace!(count, "Codes confirmed by device");
            }
        }

        // 安全闸：停止后只确认已在设备中的码，不再下发新码
        if !self.buffers.is_printing() {
            return;
        }

        let room = refill.min(self.buffers.printed_queue.spare());
        let fresh = self.buffers.print_queue.shift_up_to(room);
        if fresh.is_empty() {
            return;
        }

        let records: Vec<String> = fresh
            .iter()
            .map(|item| protocol::mail_record(self.buffers.print_counter.add_i64(1), &item.code))
            .collect();
        if let Err(full) = self.buffers.printed_queue.push(fresh) {
            tracing::error!(rejected = full.rejected.len(), "Printed queue overflow");
        }

        tracing::debug!(
            count = records.len(),
            fifo_entries = status.fifo_entries,
            "Sending codes to printer"
        );
        self.link.write(&protocol::join_records(&records)).await;
    }

    /// 设备告警/自由文本：在途码的接收状态未知，全部标记为未确认
    async fn handle_device_message(&self, text: &str) {
        tracing::warn!(message = %text, "Device message");
        self.buffers.display_message.set(text);

        let in_flight = self.buffers.printed_queue.shift_all();
        if in_flight.is_empty() {
            return;
        }
        let ids: Vec<i64> = in_flight.iter().map(|item| item.id).collect();
        match self.store.mark_unconfirmed(&ids, now_millis()).await {
            Ok(updated) => tracing::info!(updated, "Marked in-flight codes unconfirmed"),
            Err(e) => tracing::error!(count = ids.len(), error = %e, "Failed to mark codes unconfirmed"),
        }
    }

    /// 下发指令。查询的应答经行订阅回到状态机；动作指令等待带地址前缀的应答，
    /// 失败只记录日志
    async fn send(&self, command: Command) {
        if command.is_query() {
            self.link.write(command.as_str()).await;
            return;
        }
        let options = RequestOptions::expect(ResponseMatcher::Prefix(ADDRESS_PREFIX.to_string()))
            .with_timeout(self.config.command_timeout);
        if let Err(e) = self.link.write_and_response(command.as_str(), options).await {
            tracing::warn!(command = %command, error = %e, "Printer command failed");
        }
    }
}
