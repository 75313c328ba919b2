//! Recognising guided launches and pricing their payload.
//!
//! A projectile is guided when its name tag has the form
//! `m/<two-digit connection id>/<name>`. Its budget is the value of the
//! ingredients it was built from: one sheet of casing, propellant per
//! unit of flight duration, and each explosive charge with its
//! modifiers.

use homing_core::ConnectionId;

// Values are multiples of 9 so every fractional share below is whole.
const CASING_VALUE: u32 = 10 * 9;
const PROPELLANT_VALUE: u32 = 3 * 9;
const DYE_VALUE: u32 = 3 * 9;
const BLAZE_VALUE: u32 = 100 * 9;
const COAL_VALUE: u32 = 20 * 9;
const GOLD_VALUE: u32 = 3 * 9;
const HEAD_VALUE: u32 = 10_000 * 9;
const FEATHER_VALUE: u32 = 20 * 9;
const DIAMOND_VALUE: u32 = 1_000 * 9;
const GLOWSTONE_VALUE: u32 = 10 * 9;

/// Smallest budget any buildable projectile can have.
pub const MIN_BUDGET: u32 =
    CASING_VALUE / 3 + PROPELLANT_VALUE / 3 + PROPELLANT_VALUE / 3 + DYE_VALUE / 3;

/// The guidance part of a name tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchTag {
    /// Guidance server to connect to.
    pub connection_id: ConnectionId,
    /// Display name of the missile.
    pub name: String,
}

impl LaunchTag {
    /// Parse `m/NN/name`. `None` for anything else.
    ///
    /// ```
    /// use homing_core::ConnectionId;
    /// use homing_flight::identify::LaunchTag;
    ///
    /// let tag = LaunchTag::parse("m/07/interceptor").unwrap();
    /// assert_eq!(tag.connection_id, ConnectionId(7));
    /// assert_eq!(tag.name, "interceptor");
    /// assert!(LaunchTag::parse("m/7/interceptor").is_none());
    /// ```
    pub fn parse(tag: &str) -> Option<Self> {
        let rest = tag.strip_prefix("m/")?;
        let (digits, name) = rest.split_once('/')?;
        if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
            return None;
        }
        let connection_id = digits.parse().ok()?;
        Some(Self {
            connection_id: ConnectionId(connection_id),
            name: name.to_string(),
        })
    }
}

/// Shape of one explosive charge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChargeShape {
    /// Small ball.
    SmallBall,
    /// Large ball.
    LargeBall,
    /// Star.
    Star,
    /// Creeper face.
    Creeper,
    /// Burst.
    Burst,
}

/// One explosive charge of the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Charge {
    /// Shape.
    pub shape: ChargeShape,
    /// Has a trail.
    pub trail: bool,
    /// Twinkles.
    pub twinkle: bool,
}

impl Charge {
    fn value(&self) -> u32 {
        let base = match self.shape {
            ChargeShape::SmallBall => PROPELLANT_VALUE / 3 + DYE_VALUE / 3,
            ChargeShape::LargeBall => {
                PROPELLANT_VALUE * 4 / 9 + DYE_VALUE / 3 + BLAZE_VALUE / 9 + COAL_VALUE / 9
            }
            ChargeShape::Star => PROPELLANT_VALUE / 3 + DYE_VALUE / 3 + GOLD_VALUE / 3,
            ChargeShape::Creeper => PROPELLANT_VALUE / 3 + DYE_VALUE / 3 + HEAD_VALUE / 3,
            ChargeShape::Burst => PROPELLANT_VALUE / 3 + DYE_VALUE / 3 + FEATHER_VALUE / 3,
        };
        let trail = if self.trail { DIAMOND_VALUE / 3 } else { 0 };
        let twinkle = if self.twinkle { GLOWSTONE_VALUE / 3 } else { 0 };
        base + trail + twinkle
    }
}

/// Budget of a projectile with `charges` and `flight_duration` units of
/// propellant.
pub fn calculate_budget(charges: &[Charge], flight_duration: u32) -> u32 {
    let propellant = PROPELLANT_VALUE.saturating_mul(flight_duration) / 3;
    let budget = charges
        .iter()
        .fold(CASING_VALUE / 3 + propellant, |acc, c| {
            acc.saturating_add(c.value())
        });
    log::debug!(
        "budget {budget} for {} charge(s), flight duration {flight_duration}",
        charges.len()
    );
    budget
}
