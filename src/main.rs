//! Instrument Bench Firmware
//!
//! Entry point for the STM32F407 bench instrument. Brings up the AD9833
//! signal source, the front-panel encoder, the QN8025 FM receiver and a
//! UART console, and spawns one task per concern.

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Async;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{self, BufferedUart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use instrument_firmware::drivers::ad9833::{Ad9833, Waveform};
use instrument_firmware::drivers::ec11::{BoundedValue, Ec11, EncoderEvent};
use instrument_firmware::drivers::qn8025::{Qn8025, SignalCheck, SCAN_START_KHZ, SCAN_STOP_KHZ};
use instrument_firmware::hal::gpio::StatusLed;
use instrument_firmware::hal::serial::Serial;
use instrument_firmware::prelude::*;

bind_interrupts!(struct Irqs {
    I2C1_EV => i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => i2c::ErrorInterruptHandler<peripherals::I2C1>;
    USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
});

/// Signal source frequency range, Hz
const SOURCE_MIN_HZ: u32 = 1;
const SOURCE_MAX_HZ: u32 = 12_500_000;
const SOURCE_START_HZ: u32 = 1_000;

/// Frequency change per encoder step
const SOURCE_STEP_HZ: u32 = 100;

/// Commands for the synth task
#[derive(Clone, Copy)]
enum SynthCommand {
    Frequency(u32),
    Waveform(Waveform),
}

static SYNTH: Channel<CriticalSectionRawMutex, SynthCommand, 4> = Channel::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Instrument firmware v{}", env!("CARGO_PKG_VERSION"));

    let p = embassy_stm32::init(embassy_stm32::Config::default());

    // PC13 status LED, active low on the board
    let led = Output::new(p.PC13, Level::High, Speed::Low);

    // AD9833 on PB13 (SCLK), PB15 (SDATA), PB12 (FSYNC)
    let sclk = Output::new(p.PB13, Level::High, Speed::VeryHigh);
    let sdata = Output::new(p.PB15, Level::Low, Speed::VeryHigh);
    let fsync = Output::new(p.PB12, Level::High, Speed::VeryHigh);

    // Encoder on PA6/PA7, switch on PA5
    let enc_a = Input::new(p.PA6, Pull::Up);
    let enc_b = Input::new(p.PA7, Pull::Up);
    let enc_sw = Input::new(p.PA5, Pull::Up);

    // I2C1 on PB8 (SCL) / PB9 (SDA) for the FM receiver
    let i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH0,
        Hertz(I2C_FREQUENCY_HZ),
        Default::default(),
    );

    match Ad9833::new(sclk, sdata, fsync, Delay) {
        Ok(synth) => spawner.must_spawn(synth_task(synth)),
        Err(e) => error!("AD9833 setup failed: {}", e),
    }
    spawner.must_spawn(heartbeat_task(led));
    spawner.must_spawn(encoder_task(Ec11::new(enc_a, enc_b, enc_sw)));
    spawner.must_spawn(radio_task(Qn8025::new(i2c, Delay)));

    // Console runs in main so its buffers can live on this stack
    let mut tx_buf = [0u8; 64];
    let mut rx_buf = [0u8; 64];
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = CONSOLE_BAUD;
    let uart = match BufferedUart::new(
        p.USART1,
        Irqs,
        p.PA10,
        p.PA9,
        &mut tx_buf,
        &mut rx_buf,
        uart_config,
    ) {
        Ok(uart) => uart,
        Err(_) => {
            error!("USART1 setup failed");
            loop {
                Timer::after(Duration::from_secs(10)).await;
            }
        }
    };

    info!("Tasks spawned, console on USART1");
    console(Serial::new(uart)).await;
}

/// Single-byte console commands
///
/// `+`/`-` step the source, `s`/`t`/`q` pick the waveform, `?` reports.
async fn console(mut serial: Serial<BufferedUart<'_>>) {
    let mut frequency = BoundedValue::new(SOURCE_START_HZ, SOURCE_MIN_HZ, SOURCE_MAX_HZ);
    if let Err(e) = serial.arm_receive(1) {
        error!("console: {}", e);
        return;
    }

    loop {
        let command = match serial.receive_frame_async().await {
            Ok(frame) => frame.first().copied().unwrap_or(b'?'),
            Err(e) => {
                warn!("console: {}", e);
                continue;
            }
        };

        let request = match command {
            b'+' => {
                frequency.set(frequency.get().saturating_mul(10));
                Some(SynthCommand::Frequency(frequency.get()))
            }
            b'-' => {
                frequency.set(frequency.get() / 10);
                Some(SynthCommand::Frequency(frequency.get()))
            }
            b's' => Some(SynthCommand::Waveform(Waveform::Sine)),
            b't' => Some(SynthCommand::Waveform(Waveform::Triangle)),
            b'q' => Some(SynthCommand::Waveform(Waveform::Square)),
            _ => None,
        };

        if let Some(request) = request {
            SYNTH.send(request).await;
        }
        if let Err(e) = serial
            .print_async(format_args!("source {} Hz\r\n", frequency.get()))
            .await
        {
            warn!("console: {}", e);
        }
    }
}

/// Heartbeat task, blinks the status LED
#[embassy_executor::task]
async fn heartbeat_task(led: Output<'static>) {
    let Ok(mut led) = StatusLed::new(led) else {
        return;
    };
    loop {
        let _ = led.on();
        Timer::after(Duration::from_millis(100)).await;
        let _ = led.off();
        Timer::after(Duration::from_millis(900)).await;
    }
}

/// Applies frequency and waveform changes to the AD9833
#[embassy_executor::task]
async fn synth_task(mut synth: Ad9833<Output<'static>, Delay>) {
    let mut waveform = Waveform::Sine;
    let mut hz = SOURCE_START_HZ;

    if let Err(e) = synth.init(waveform, f64::from(hz), 0.0) {
        error!("AD9833 init failed: {}", e);
        return;
    }
    info!("AD9833 running at {} Hz", hz);

    loop {
        match SYNTH.receive().await {
            SynthCommand::Frequency(new_hz) => {
                hz = new_hz;
                if let Err(e) = synth.set_output(f64::from(hz), 0.0) {
                    warn!("AD9833 set_output: {}", e);
                }
            }
            SynthCommand::Waveform(new_waveform) => {
                waveform = new_waveform;
                if let Err(e) = synth.set_waveform(waveform) {
                    warn!("AD9833 set_waveform: {}", e);
                }
            }
        }
        info!("AD9833 {} at {} Hz", waveform, hz);
    }
}

/// Polls the encoder every millisecond and steps the source frequency
#[embassy_executor::task]
async fn encoder_task(mut encoder: Ec11<Input<'static>, Input<'static>, Input<'static>>) {
    let mut frequency = BoundedValue::new(SOURCE_START_HZ, SOURCE_MIN_HZ, SOURCE_MAX_HZ);
    let mut ticker = Ticker::every(Duration::from_millis(1));

    loop {
        ticker.next().await;
        #[allow(clippy::cast_possible_truncation)]
        let now_ms = Instant::now().as_millis() as u32;

        match encoder.poll(now_ms) {
            Ok(Some(EncoderEvent::Rotate { direction, steps })) => {
                frequency.handle_rotation(direction, steps.saturating_mul(SOURCE_STEP_HZ));
                SYNTH.send(SynthCommand::Frequency(frequency.get())).await;
            }
            Ok(Some(EncoderEvent::LongPress)) => {
                frequency.set(SOURCE_START_HZ);
                SYNTH.send(SynthCommand::Frequency(frequency.get())).await;
            }
            Ok(Some(event)) => info!("encoder: {}", event),
            Ok(None) => {}
            Err(e) => warn!("encoder: {}", e),
        }
    }
}

/// Locks the FM receiver on the strongest station and keeps it there
#[embassy_executor::task]
async fn radio_task(mut radio: Qn8025<I2c<'static, Async>, Delay>) {
    match radio.begin().await {
        Ok(id) => info!("QN8025 id {=u8:02X} {=u8:02X}", id.cid1, id.cid2),
        Err(e) => {
            error!("QN8025 not found: {}", e);
            return;
        }
    }

    match radio.scan_and_lock_best(SCAN_START_KHZ, SCAN_STOP_KHZ).await {
        Ok(Some(khz)) => info!("QN8025 locked {} kHz", khz),
        Ok(None) => warn!("QN8025 found no station"),
        Err(e) => warn!("QN8025 scan: {}", e),
    }

    let mut ticker = Ticker::every(Duration::from_millis(250));
    loop {
        ticker.next().await;
        match radio.poll_signal(Instant::now().as_millis()).await {
            Ok(SignalCheck::Rescanned(found)) => info!("QN8025 rescanned: {}", found),
            Ok(_) => {}
            Err(e) => warn!("QN8025: {}", e),
        }
    }
}
