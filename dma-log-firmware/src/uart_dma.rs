//! USART1 transmitter driven by DMA1 channel 4.

use defmt::Format;
use dma_log::{StartError, UartDma};
use stm32f1::stm32f103::Peripherals;
use stm32f1xx_hal::rcc::Clocks;

/// Fault code: transfer longer than the DMA counter.
pub const FAULT_TOO_LONG: u8 = 0x01;

/// Fault code: transfer error flag of previous transfer still set.
pub const FAULT_TRANSFER_ERROR: u8 = 0x02;

/// Outcome of a DMA channel 4 interrupt.
#[derive(Clone, Copy, Format, PartialEq, Eq)]
pub enum Completion {
    /// All bytes have been moved to the UART.
    Done,
    /// Bus error, the transfer was aborted by hardware.
    Error,
    /// No transfer event pending.
    Spurious,
}

/// USART1 transmitter driven by DMA1 channel 4.
///
/// TX pin PA9 must be configured as alternate function push-pull.
pub struct Usart1Dma {
    dp: Peripherals,
}

impl Usart1Dma {
    /// Enables USART1 for transmission at `baud` and prepares DMA1 channel 4.
    pub fn new(clocks: &Clocks, baud: u32) -> Self {
        let dp = unsafe { Peripherals::steal() };

        dp.RCC.apb2enr.modify(|_, w| w.usart1en().set_bit());
        dp.RCC.ahbenr.modify(|_, w| w.dma1en().set_bit());

        dp.USART1.brr.write(|w| unsafe { w.bits(clocks.pclk2().raw() / baud) });
        dp.USART1.cr3.modify(|_, w| w.dmat().set_bit());
        dp.USART1.cr1.write(|w| w.ue().set_bit().te().set_bit());

        let ch = &dp.DMA1.ch4;
        ch.cr.write(|w| w.en().clear_bit());
        ch.par.write(|w| unsafe { w.pa().bits(&dp.USART1.dr as *const _ as u32) });
        ch.cr.write(|w| {
            w.dir().set_bit();
            w.minc().set_bit();
            w.pinc().clear_bit();
            w.circ().clear_bit();
            w.tcie().set_bit();
            w.teie().set_bit()
        });
        dp.DMA1.ifcr.write(|w| w.cgif4().set_bit());

        defmt::info!("USART1 DMA transmitter at {} baud", baud);
        Self { dp }
    }

    /// Acknowledges the DMA1 channel 4 interrupt and stops the channel.
    ///
    /// Must be called from the interrupt handler before signalling completion to the logger.
    pub fn acknowledge() -> Completion {
        let dp = unsafe { Peripherals::steal() };

        let isr = dp.DMA1.isr.read();
        let completion = if isr.teif4().bit_is_set() {
            Completion::Error
        } else if isr.tcif4().bit_is_set() {
            Completion::Done
        } else {
            Completion::Spurious
        };

        dp.DMA1.ifcr.write(|w| w.cgif4().set_bit());
        if completion != Completion::Spurious {
            dp.DMA1.ch4.cr.modify(|_, w| w.en().clear_bit());
        }

        completion
    }

    /// True once USART1 has shifted out the last byte written by DMA.
    pub fn transmission_complete() -> bool {
        let dp = unsafe { Peripherals::steal() };
        dp.USART1.sr.read().tc().bit_is_set()
    }
}

impl UartDma for Usart1Dma {
    fn start(&mut self, data: &[u8]) -> Result<(), StartError> {
        let dma = &self.dp.DMA1;
        let ch = &dma.ch4;

        if ch.cr.read().en().bit_is_set() {
            return Err(StartError::Busy);
        }
        let Ok(len) = u16::try_from(data.len()) else {
            return Err(StartError::Fault(FAULT_TOO_LONG));
        };
        if dma.isr.read().teif4().bit_is_set() {
            dma.ifcr.write(|w| w.cgif4().set_bit());
            return Err(StartError::Fault(FAULT_TRANSFER_ERROR));
        }

        ch.mar.write(|w| unsafe { w.ma().bits(data.as_ptr() as u32) });
        ch.ndtr.write(|w| w.ndt().bits(len));
        ch.cr.modify(|_, w| w.en().set_bit());

        Ok(())
    }
}
