//! Input-to-output dependency matrices and out-port grouping.

/// Which dependency relation a graph is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Feedthrough during a communication step.
    Runtime,
    /// Feedthrough of initial output computation.
    Initial,
}

/// Boolean input-to-output dependency matrix of one component. Row `i`,
/// column `o` states whether output port `o` depends on input port `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    num_in: usize,
    num_out: usize,
    flags: Vec<bool>,
}

impl Dependencies {
    pub fn independent(num_in: usize, num_out: usize) -> Self {
        Self {
            num_in,
            num_out,
            flags: vec![false; num_in * num_out],
        }
    }

    pub fn dense(num_in: usize, num_out: usize) -> Self {
        Self {
            num_in,
            num_out,
            flags: vec![true; num_in * num_out],
        }
    }

    pub fn num_in(&self) -> usize {
        self.num_in
    }

    pub fn num_out(&self) -> usize {
        self.num_out
    }

    pub fn set(&mut self, input: usize, output: usize, dependent: bool) {
        self.flags[input * self.num_out + output] = dependent;
    }

    pub fn get(&self, input: usize, output: usize) -> bool {
        self.flags[input * self.num_out + output]
    }

    /// Input ports a given output port depends on.
    pub fn inputs_of(&self, output: usize) -> Vec<usize> {
        (0..self.num_in).filter(|&i| self.get(i, output)).collect()
    }
}

/// One evaluation group of a component: output ports sharing the same set of
/// feedthrough inputs.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub outputs: Vec<usize>,
    pub inputs: Vec<usize>,
}

/// Partition of a component's output ports into evaluation groups.
#[derive(Debug, Clone)]
pub struct PortGroups {
    groups: Vec<GroupInfo>,
    out_to_group: Vec<usize>,
}

impl PortGroups {
    /// Group output ports by identical dependency rows. Dense feedthrough
    /// components collapse to a single group; a component without output
    /// ports still gets one (empty) group carrying all of its inputs so
    /// that inbound connections order it after its sources.
    pub fn compute(deps: &Dependencies) -> Self {
        let mut groups: Vec<GroupInfo> = Vec::new();
        let mut out_to_group = vec![0usize; deps.num_out()];

        for output in 0..deps.num_out() {
            let inputs = deps.inputs_of(output);
            match groups.iter().position(|g| g.inputs == inputs) {
                Some(idx) => {
                    groups[idx].outputs.push(output);
                    out_to_group[output] = idx;
                }
                None => {
                    out_to_group[output] = groups.len();
                    groups.push(GroupInfo {
                        outputs: vec![output],
                        inputs,
                    });
                }
            }
        }

        if groups.is_empty() {
            groups.push(GroupInfo {
                outputs: Vec::new(),
                inputs: (0..deps.num_in()).collect(),
            });
        }

        Self {
            groups,
            out_to_group,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, idx: usize) -> &GroupInfo {
        &self.groups[idx]
    }

    pub fn groups(&self) -> &[GroupInfo] {
        &self.groups
    }

    /// Group owning a given output port.
    pub fn group_of_output(&self, output: usize) -> usize {
        self.out_to_group[output]
    }

    /// Groups whose feedthrough set contains a given input port.
    pub fn groups_of_input(&self, input: usize) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.inputs.contains(&input))
            .map(|(idx, _)| idx)
    }
}
