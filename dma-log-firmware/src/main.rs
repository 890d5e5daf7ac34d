//
// DMA log demonstration firmware
// Copyright (C) 2022 Sebastian Urban <surban@surban.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//

//! DMA log demonstration firmware.
//!
//! Streams log messages over USART1 (PA9, 115200 baud) using DMA while
//! diagnostics of the logger itself go to defmt over RTT.

#![no_std]
#![no_main]

mod clock;
mod uart_dma;

use defmt_rtt as _;
use panic_probe as _;
use stm32f1xx_hal as _;

use dma_log::{emit, Clock, Diagnostic, DmaLog, DEFAULT_FLUSH_TIMEOUT_MS};
use embedded_hal::blocking::delay::DelayMs;
use systick_monotonic::*;

use crate::{
    clock::MonoClock,
    uart_dma::{Completion, Usart1Dma},
};

include!(concat!(env!("OUT_DIR"), "/log_cfg.rs"));

/// Firmware version.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

/// UART baud rate.
const BAUD: u32 = 115_200;

/// Uptime after which the firmware flushes its log and restarts.
const RESTART_AFTER_SECS: u64 = 24 * 60 * 60;

/// Time for USART1 to shift out its last byte after the final DMA transfer.
const TX_SHIFT_OUT_MS: u32 = 10;

/// UART log.
pub static LOG: DmaLog<Usart1Dma, LOG_CAPACITY, LOG_STAGE, LOG_MESSAGE> = DmaLog::new();

/// Reports logger diagnostics over RTT.
fn report(diag: &Diagnostic) {
    defmt::warn!("UART log: {}", diag);
}

/// Transmits everything buffered in the UART log, so that it survives a reset.
///
/// Waits for the last DMA transfer and for USART1 to become idle.
fn drain_log(clock: &mut MonoClock) {
    // Failures have been passed to report.
    if LOG.drain(clock, DEFAULT_FLUSH_TIMEOUT_MS).is_err() {
        return;
    }

    let start = clock.millis();
    while !Usart1Dma::transmission_complete() {
        if clock.millis().wrapping_sub(start) >= TX_SHIFT_OUT_MS {
            defmt::warn!("USART1 did not become idle");
            return;
        }
        clock.delay_ms(1);
    }
}

#[rtic::app(device = stm32f1::stm32f103, peripherals = true, dispatchers = [SPI1, SPI2])]
mod app {
    use super::*;
    use stm32f1xx_hal::prelude::*;

    /// System timer.
    #[monotonic(binds = SysTick, default = true)]
    type MyMono = Systick<1000>;

    /// Shared resources.
    #[shared]
    struct Shared {
        /// If true, idle task flushes the log and restarts.
        restart: bool,
    }

    /// Exclusive resources.
    #[local]
    struct Local {
        /// Clock for bounded flushing.
        clock: MonoClock,
    }

    /// Initialization (entry point).
    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("DMA log firmware version {}", VERSION);

        let rcc = cx.device.RCC.constrain();
        let mut flash = cx.device.FLASH.constrain();
        let clocks = rcc.cfgr.use_hse(8.MHz()).sysclk(72.MHz()).pclk1(36.MHz()).freeze(&mut flash.acr);
        let mono = Systick::new(cx.core.SYST, clocks.sysclk().to_Hz());

        // USART1 TX on PA9.
        let mut gpioa = cx.device.GPIOA.split();
        let _tx = gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh);

        if LOG.init(Usart1Dma::new(&clocks, BAUD), report).is_err() {
            defmt::panic!("UART log busy during init");
        }
        defmt::info!("UART log: {}", LOG.status());

        emit!(LOG, "DMA log firmware {}\r\n", VERSION);
        emit!(LOG, "sysclk: {} Hz, baud: {}\r\n", clocks.sysclk().to_Hz(), BAUD);

        defmt::unwrap!(heartbeat::spawn());
        defmt::unwrap!(print_status::spawn_after(10u64.secs()));

        defmt::debug!("init done");
        (
            Shared { restart: false },
            Local { clock: MonoClock::new(clocks.sysclk().to_Hz()) },
            init::Monotonics(mono),
        )
    }

    /// Idle task.
    ///
    /// Pumps the UART log.
    #[idle(local = [clock], shared = [restart])]
    fn idle(mut cx: idle::Context) -> ! {
        while !cx.shared.restart.lock(|restart| *restart) {
            LOG.process();

            // Sleep and wait for interrupt.
            rtic::export::wfi()
        }

        emit!(LOG, "restarting\r\n");
        drain_log(cx.local.clock);
        cortex_m::peripheral::SCB::sys_reset();
    }

    /// Emits a heartbeat message every second.
    #[task(shared = [restart], local = [beats: u64 = 0], priority = 1)]
    fn heartbeat(mut cx: heartbeat::Context) {
        *cx.local.beats += 1;
        let beats = *cx.local.beats;

        emit!(LOG, "[{:>8}] heartbeat {}\r\n", monotonics::now().duration_since_epoch().to_millis(), beats);

        if beats >= RESTART_AFTER_SECS {
            cx.shared.restart.lock(|restart| *restart = true);
        } else {
            defmt::unwrap!(heartbeat::spawn_after(1u64.secs()));
        }
    }

    /// Prints logger status over RTT.
    #[task(priority = 1)]
    fn print_status(_cx: print_status::Context) {
        defmt::debug!("UART log: {}", LOG.status());
        defmt::unwrap!(print_status::spawn_after(10u64.secs()));
    }

    /// UART DMA transfer complete interrupt.
    #[task(binds = DMA1_CHANNEL4, priority = 2)]
    fn log_tx_done(_cx: log_tx_done::Context) {
        match Usart1Dma::acknowledge() {
            Completion::Done => (),
            Completion::Error => defmt::warn!("UART log DMA transfer error"),
            Completion::Spurious => return,
        }
        LOG.on_tx_complete();
    }
}
