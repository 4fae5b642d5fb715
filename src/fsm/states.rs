//! Concrete phase handlers and table builder.
//!
//! Each phase is three plain `fn` pointers plus a duration selector.  No
//! closures, no dynamic dispatch.
//!
//! ```text
//!  trial 1          trial 2                 trial N
//!  INFLATE ─▶ HOLD ─▶ DEFLATE ─▶ REST ─▶ INFLATE ─▶ … ─▶ DEFLATE ─▶ done
//!
//!  any phase ──[stop]──▶ Halted     any phase ──[fault]──▶ Errored
//! ```

use embedded_hal::digital::OutputPin;

use super::context::FsmContext;
use super::{Phase, PhaseDescriptor, PhaseTable};
use crate::app::ports::{ClockPort, VoltagePort};
use crate::drivers::Line;
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the phase table.  Called once per engine.
pub fn build_phase_table<P, V, C>() -> PhaseTable<P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    [
        // Index 0: Inflate
        PhaseDescriptor {
            phase: Phase::Inflate,
            name: "Inflate",
            on_enter: None,
            on_poll: inflate_poll::<P, V, C>,
            on_exit: Some(inflate_exit::<P, V, C>),
            duration: |c| c.inflate_time,
        },
        // Index 1: Hold
        PhaseDescriptor {
            phase: Phase::Hold,
            name: "Hold",
            on_enter: None,
            on_poll: hold_poll::<P, V, C>,
            on_exit: None,
            duration: |c| c.hold_time,
        },
        // Index 2: Deflate
        PhaseDescriptor {
            phase: Phase::Deflate,
            name: "Deflate",
            on_enter: None,
            on_poll: deflate_poll::<P, V, C>,
            on_exit: Some(deflate_exit::<P, V, C>),
            duration: |c| c.deflate_time,
        },
        // Index 3: Rest
        PhaseDescriptor {
            phase: Phase::Rest,
            name: "Rest",
            on_enter: None,
            on_poll: rest_poll::<P, V, C>,
            on_exit: None,
            duration: |c| c.rest_time,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INFLATE: track the rising ramp
// ═══════════════════════════════════════════════════════════════════════════

fn inflate_poll<P, V, C>(ctx: &mut FsmContext<P, V, C>, elapsed: f64) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    let target = ctx.ramp.inflate_at(elapsed);
    let regulator = ctx.regulator;
    regulator.raise_to(ctx, target)
}

fn inflate_exit<P, V, C>(ctx: &mut FsmContext<P, V, C>) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    ctx.force_off(Line::InflationPump)
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOLD: sample only
// ═══════════════════════════════════════════════════════════════════════════

fn hold_poll<P, V, C>(ctx: &mut FsmContext<P, V, C>, _elapsed: f64) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    ctx.sample()?;
    ctx.idle();
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  DEFLATE: track the falling ramp
// ═══════════════════════════════════════════════════════════════════════════

fn deflate_poll<P, V, C>(ctx: &mut FsmContext<P, V, C>, elapsed: f64) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    let target = ctx.ramp.deflate_at(elapsed);
    let regulator = ctx.regulator;
    regulator.lower_to(ctx, target)
}

fn deflate_exit<P, V, C>(ctx: &mut FsmContext<P, V, C>) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    ctx.force_off(Line::DeflationPump)
}

// ═══════════════════════════════════════════════════════════════════════════
//  REST: no actuator commands
// ═══════════════════════════════════════════════════════════════════════════

fn rest_poll<P, V, C>(ctx: &mut FsmContext<P, V, C>, _elapsed: f64) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    ctx.idle();
    Ok(())
}
