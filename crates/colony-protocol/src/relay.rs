//! The compact relay sub-protocol (`%xt%...%`).
//!
//! Real-time orders are too frequent for full envelopes, so the server
//! relays them as a flat record of percent-delimited positional fields:
//!
//! ```text
//! %xt%5%<room>%<option>%<position>%<kind>%<f5>%<f6>%<f7>%
//! ```
//!
//! `kind` selects what fields 5..7 mean: `0` building, `1` unit, `2`
//! missile. Unit orders carry a variable-length `random` sequence which is
//! packed into slots 6 and 7 when it has at most two entries and appended
//! after slot 5 otherwise.
//!
//! Clients *request* relays with an `xtReq` envelope whose body is a data
//! object; [`XtCommand::parse`] turns that into a [`RelayRecord`].

use std::fmt;

use crate::{DataObject, ProtocolError, RoomId};

/// Constant first field of every relay record.
pub const RELAY_TAG: u32 = 5;

const PREFIX: &str = "%xt%";
const FIXED_FIELDS: usize = 8;

/// The kind-specific part of a relay record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOrder {
    /// Kind `0`.
    Building {
        building: String,
        cancel_order: i64,
        auto: i64,
    },
    /// Kind `1`.
    Unit { set_id: String, random: Vec<String> },
    /// Kind `2`.
    Missile {
        target: String,
        px: String,
        py: String,
    },
}

impl RelayOrder {
    /// The `commandKind` discriminator.
    pub fn kind(&self) -> u8 {
        match self {
            Self::Building { .. } => 0,
            Self::Unit { .. } => 1,
            Self::Missile { .. } => 2,
        }
    }
}

/// One relay record, ready to be broadcast to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRecord {
    pub room: RoomId,
    /// Empty when the client sent no option.
    pub option: String,
    pub position: String,
    pub order: RelayOrder,
}

impl RelayRecord {
    /// The positional fields, without the `%xt%` prefix.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            RELAY_TAG.to_string(),
            self.room.to_string(),
            self.option.clone(),
            self.position.clone(),
            self.order.kind().to_string(),
        ];
        match &self.order {
            RelayOrder::Building {
                building,
                cancel_order,
                auto,
            } => {
                fields.push(building.clone());
                fields.push(cancel_order.to_string());
                fields.push(auto.to_string());
            }
            RelayOrder::Unit { set_id, random } => {
                fields.push(set_id.clone());
                if random.len() > 2 {
                    fields.extend(random.iter().cloned());
                } else {
                    fields.extend(random.iter().cloned());
                    fields.resize(FIXED_FIELDS, "0".to_string());
                }
            }
            RelayOrder::Missile { target, px, py } => {
                fields.push(target.clone());
                fields.push(px.clone());
                fields.push(py.clone());
            }
        }
        fields
    }

    /// Decodes a rendered record back into its parts.
    ///
    /// Unit records with eight fields always yield two `random` entries;
    /// the wire cannot tell a padded slot from a real `0`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let rest = text
            .strip_prefix(PREFIX)
            .ok_or_else(|| ProtocolError::invalid("relay prefix", text))?;
        let mut fields: Vec<&str> = rest.split('%').collect();
        if fields.last() == Some(&"") {
            fields.pop();
        }
        if fields.len() < FIXED_FIELDS {
            return Err(ProtocolError::invalid("relay field count", text));
        }
        if fields[0] != RELAY_TAG.to_string() {
            return Err(ProtocolError::invalid("relay tag", fields[0]));
        }

        let order = match fields[4] {
            "0" => RelayOrder::Building {
                building: fields[5].to_string(),
                cancel_order: parse_int("cancelOrder", fields[6])?,
                auto: parse_int("auto", fields[7])?,
            },
            "1" => RelayOrder::Unit {
                set_id: fields[5].to_string(),
                random: fields[6..].iter().map(|f| f.to_string()).collect(),
            },
            "2" => RelayOrder::Missile {
                target: fields[5].to_string(),
                px: fields[6].to_string(),
                py: fields[7].to_string(),
            },
            other => return Err(ProtocolError::invalid("relay kind", other)),
        };

        Ok(Self {
            room: fields[1].parse()?,
            option: fields[2].to_string(),
            position: fields[3].to_string(),
            order,
        })
    }
}

impl fmt::Display for RelayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PREFIX)?;
        for field in self.fields() {
            write!(f, "{field}%")?;
        }
        Ok(())
    }
}

/// A decoded `xtReq` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XtCommand {
    /// `cmd=s`: record which session occupies which slot.
    SetPositions(Vec<String>),
    /// `cmd=m`: relay an order to the room.
    Order(RelayRecord),
}

impl XtCommand {
    /// Interprets an `xtReq` payload sent to `room`.
    ///
    /// Returns `Ok(None)` when the payload carries no `cmd` at all.
    pub fn parse(
        room: RoomId,
        payload: &DataObject,
    ) -> Result<Option<Self>, ProtocolError> {
        let vars = payload.room_vars();
        let Some(cmd) = vars.get("cmd") else {
            return Ok(None);
        };

        match cmd.as_str() {
            "s" => {
                let slots = payload
                    .array("setArray")
                    .ok_or_else(|| ProtocolError::MissingElement("setArray".into()))?;
                Ok(Some(Self::SetPositions(slots)))
            }
            "m" => parse_order(room, payload).map(|r| Some(Self::Order(r))),
            other => Err(ProtocolError::UnknownCase(format!("xtReq cmd '{other}'"))),
        }
    }
}

fn parse_order(room: RoomId, payload: &DataObject) -> Result<RelayRecord, ProtocolError> {
    let outer = payload.require_first_obj()?;
    let kind = outer.require_var("cmd")?;

    let order = match kind {
        "0" => {
            // Building fields may be spread over several nested objects.
            let var = |name: &str| {
                outer
                    .objs()
                    .flat_map(|o| o.vars())
                    .find(|v| v.name == name)
                    .map(|v| v.value.as_str())
                    .ok_or_else(|| ProtocolError::MissingElement(format!("var {name}")))
            };
            RelayOrder::Building {
                building: var("building")?.to_string(),
                cancel_order: parse_int("cancelOrder", var("cancelOrder")?)?,
                auto: parse_int("auto", var("auto")?)?,
            }
        }
        "1" => {
            let inner = outer
                .first_obj()
                .ok_or_else(|| ProtocolError::MissingElement("obj".into()))?;
            let random = inner
                .first_obj()
                .map(|r| r.vars().map(|v| v.value.clone()).collect())
                .unwrap_or_default();
            RelayOrder::Unit {
                set_id: inner.require_var("setId")?.to_string(),
                random,
            }
        }
        "2" => {
            let inner = outer
                .first_obj()
                .ok_or_else(|| ProtocolError::MissingElement("obj".into()))?;
            RelayOrder::Missile {
                target: inner.require_var("tar")?.to_string(),
                px: inner.require_var("px")?.to_string(),
                py: inner.require_var("py")?.to_string(),
            }
        }
        other => {
            return Err(ProtocolError::UnknownCase(format!(
                "relay command kind '{other}'"
            )));
        }
    };

    Ok(RelayRecord {
        room,
        option: outer.var("option").unwrap_or_default().to_string(),
        position: outer.require_var("pos")?.to_string(),
        order,
    })
}

fn parse_int(field: &str, value: &str) -> Result<i64, ProtocolError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::invalid(field, value))
}
