//! Expansion of user-level connection records into per-scalar
//! [`ConnectionInfo`]s, with endpoint lookup and type/unit checking.

use std::collections::HashMap;

use lockstep_input::connections::{ConnectionInput, EndpointInput};
use lockstep_input::InputError;

use crate::comp::Component;
use crate::conn::ConnectionInfo;
use crate::{Error, Outcome, Status};

/// A resolved endpoint: the component, its vector channel, and the selected
/// scalar sub-range (absolute channel ids).
struct ResolvedEndpoint {
    comp: usize,
    start: usize,
    end: usize,
    is_vector: bool,
}

fn find_component(
    components: &[Component],
    input: &ConnectionInput,
    endpoint: &EndpointInput,
) -> Result<usize, Error> {
    let name = endpoint
        .component()
        .ok_or_else(|| InputError::MissingField {
            field: "component",
            location: input.location.clone(),
        })?;
    components
        .iter()
        .position(|c| c.name() == name)
        .ok_or_else(|| Error::UnknownComponent {
            name: name.to_string(),
            location: input.location.clone(),
        })
}

fn resolve_endpoint(
    components: &[Component],
    input: &ConnectionInput,
    endpoint: &EndpointInput,
    output_side: bool,
) -> Result<ResolvedEndpoint, Error> {
    let comp = find_component(components, input, endpoint)?;
    let databus = components[comp].databus();

    let vector_idx = if output_side {
        databus.find_out_vector(endpoint.channel())
    } else {
        databus.find_in_vector(endpoint.channel())
    }
    .ok_or_else(|| Error::UnknownChannel {
        component: components[comp].name().to_string(),
        channel: endpoint.channel().to_string(),
        location: input.location.clone(),
    })?;

    let vector = if output_side {
        databus.out_vector_info(vector_idx)
    } else {
        databus.in_vector_info(vector_idx)
    }
    .expect("vector index from lookup");

    match endpoint {
        EndpointInput::Scalar { .. } => {
            if !vector.is_scalar() {
                return Err(Error::EndpointShapeMismatch {
                    connection: connection_label(input),
                });
            }
            Ok(ResolvedEndpoint {
                comp,
                start: vector.start_index,
                end: vector.start_index,
                is_vector: false,
            })
        }
        EndpointInput::Vector {
            start_index,
            end_index,
            ..
        } => {
            if end_index < start_index {
                return Err(Error::InvalidVectorRange {
                    channel: endpoint.channel().to_string(),
                    start_index: *start_index,
                    end_index: *end_index,
                });
            }
            // indices are relative to the port
            let start = vector.start_index + start_index;
            let end = vector.start_index + end_index;
            if !vector.covers(start, end) {
                return Err(Error::InvalidVectorRange {
                    channel: endpoint.channel().to_string(),
                    start_index: *start_index,
                    end_index: *end_index,
                });
            }
            Ok(ResolvedEndpoint {
                comp,
                start,
                end,
                is_vector: true,
            })
        }
    }
}

fn connection_label(input: &ConnectionInput) -> String {
    format!("{} -> {}", input.from.channel(), input.to.channel())
}

/// Expand one user-level connection into its scalar [`ConnectionInfo`]s.
///
/// A scalar endpoint expands to one info; equal-length vector endpoints
/// expand to one info per index offset, paired index-by-index. Mixing scalar
/// and vector endpoints or incompatible channel types is a hard error.
pub fn expand_connection(
    components: &[Component],
    input: &ConnectionInput,
) -> Result<Vec<ConnectionInfo>, Error> {
    let from = resolve_endpoint(components, input, &input.from, true)?;
    let to = resolve_endpoint(components, input, &input.to, false)?;

    if from.is_vector != to.is_vector {
        return Err(Error::EndpointShapeMismatch {
            connection: connection_label(input),
        });
    }

    let from_len = from.end - from.start + 1;
    let to_len = to.end - to.start + 1;
    if from_len != to_len {
        return Err(Error::VectorLengthMismatch {
            connection: connection_label(input),
            from_len,
            to_len,
        });
    }

    let decoupling = input.decoupling.clone().unwrap_or_default();

    let mut infos = Vec::with_capacity(from_len);
    for offset in 0..from_len {
        let src_channel = from.start + offset;
        let trg_channel = to.start + offset;

        let src = components[from.comp]
            .databus()
            .out_channel(src_channel)
            .expect("resolved source channel");
        let trg = components[to.comp]
            .databus()
            .in_channel(trg_channel)
            .expect("resolved target channel");

        let label = format!(
            "{}.{} -> {}.{}",
            components[from.comp].name(),
            src.info.name,
            components[to.comp].name(),
            trg.info.name,
        );

        if !src.info.ty.compatible(trg.info.ty) {
            return Err(Error::TypeMismatch {
                connection: label,
                from: src.info.ty,
                to: trg.info.ty,
            });
        }

        if let (Some(src_unit), Some(trg_unit)) = (&src.info.unit, &trg.info.unit) {
            if src_unit != trg_unit {
                return Err(Error::UnitMismatch {
                    connection: label,
                    from: src_unit.clone(),
                    to: trg_unit.clone(),
                });
            }
        }

        infos.push(ConnectionInfo::new(
            from.comp,
            src_channel,
            to.comp,
            trg_channel,
            decoupling.kind,
            decoupling.priority,
            input.inter_extrapolation,
            label,
        ));
    }

    Ok(infos)
}

/// Verify that no input channel is driven by more than one connection.
pub fn check_connectivity(components: &[Component], infos: &[ConnectionInfo]) -> Outcome {
    let mut drivers: HashMap<(usize, usize), usize> = HashMap::new();

    for info in infos {
        let key = (info.target, info.target_channel);
        if drivers.insert(key, info.source).is_some() {
            let comp = &components[info.target];
            let channel = comp
                .databus()
                .in_channel(info.target_channel)
                .expect("resolved target channel");
            return Err(Error::MultiplyDrivenInput {
                component: comp.name().to_string(),
                channel: channel.info.name.clone(),
            });
        }
    }

    Ok(Status::Ok)
}
