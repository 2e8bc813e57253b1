//! Shared fixtures for integration tests
//!
//! [`RnnGraph`] emits the node structure TensorFlow's `dynamic_rnn` leaves
//! behind after tf2onnx conversion, and [`Evaluator`] runs the small set of
//! glue ops the fusion inserts so tests can check values, not just wiring.

#![allow(dead_code)]

use ndarray::{concatenate, Array1, Array2, ArrayD, Axis, IxDyn, Slice};
use rustc_hash::FxHashMap;

use lstm_fuse::graph::GraphContext;
use lstm_fuse::proto::extensions::{make_node, make_tensor_value_info};
use lstm_fuse::proto::tensor_proto::DataType;
use lstm_fuse::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    ValueInfoProto,
};
use lstm_fuse::tensor::tensor_to_array_f64;

/// Install a test logger once
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Where the initial state comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitKind {
    /// Graph inputs `h0`, `c0` or `state0`
    Input,
    /// `Const` nodes filled with the value
    Constant(f32),
    /// `Fill` nodes broadcasting the value
    Fill(f32),
}

/// How `c` and `h` travel through the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLayout {
    /// `LSTMStateTuple(c, h)`
    Tuple,
    /// One `[batch, 2 * hidden]` variable
    Shared,
}

/// Synthetic `dynamic_rnn` graph
#[derive(Debug, Clone)]
pub struct RnnGraph {
    pub scope: String,
    pub batch: i64,
    pub time: i64,
    pub input_size: usize,
    pub hidden: usize,
    pub layout: StateLayout,
    pub init: InitKind,
    pub batch_major: bool,
    pub sequence_length: bool,
    pub forget_bias: f32,
    /// Overrides the kernel width and bias length
    pub gate_width: Option<usize>,
    /// Adds a third reader to the output exit
    pub extra_output_reader: bool,
}

impl RnnGraph {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            batch: 2,
            time: 7,
            input_size: 3,
            hidden: 4,
            layout: StateLayout::Tuple,
            init: InitKind::Input,
            batch_major: true,
            sequence_length: false,
            forget_bias: 1.0,
            gate_width: None,
            extra_output_reader: false,
        }
    }

    pub fn hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn batch(mut self, batch: i64) -> Self {
        self.batch = batch;
        self
    }

    pub fn layout(mut self, layout: StateLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn init(mut self, init: InitKind) -> Self {
        self.init = init;
        self
    }

    pub fn time_major(mut self) -> Self {
        self.batch_major = false;
        self
    }

    pub fn with_sequence_length(mut self) -> Self {
        self.sequence_length = true;
        self
    }

    pub fn gate_width(mut self, width: usize) -> Self {
        self.gate_width = Some(width);
        self
    }

    pub fn extra_output_reader(mut self) -> Self {
        self.extra_output_reader = true;
        self
    }

    fn width(&self) -> usize {
        self.gate_width.unwrap_or(4 * self.hidden)
    }

    /// Kernel in TensorFlow layout, `(input + hidden, 4 * hidden)`
    pub fn kernel(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.input_size + self.hidden, self.width()), |(r, c)| {
            (r * 100 + c) as f32
        })
    }

    /// Bias in TensorFlow layout, `(4 * hidden,)`
    pub fn bias(&self) -> Array1<f32> {
        Array1::from_shape_fn(self.width(), |i| 0.5 * i as f32)
    }

    /// Prefix of the graph outputs of this scope
    pub fn tag(&self) -> String {
        self.scope.replace('/', "_")
    }

    pub fn output_name(&self) -> String {
        format!("{}_outputs:0", self.tag())
    }

    pub fn hidden_output(&self) -> String {
        format!("{}_h:0", self.tag())
    }

    pub fn cell_output(&self) -> String {
        format!("{}_c:0", self.tag())
    }

    pub fn state_output(&self) -> String {
        format!("{}_state:0", self.tag())
    }

    fn x_shape(&self) -> Vec<i64> {
        let n = self.input_size as i64;
        if self.batch_major {
            vec![self.batch, self.time, n]
        } else {
            vec![self.time, self.batch, n]
        }
    }

    fn state_width(&self) -> usize {
        match self.layout {
            StateLayout::Tuple => self.hidden,
            StateLayout::Shared => 2 * self.hidden,
        }
    }

    /// Graph inputs read by this scope
    pub fn inputs(&self) -> Vec<ValueInfoProto> {
        let float = DataType::Float as i32;
        let state = [self.batch, self.state_width() as i64];
        let mut inputs = vec![make_tensor_value_info("X", float, &self.x_shape())];
        if self.init == InitKind::Input {
            match self.layout {
                StateLayout::Tuple => {
                    inputs.push(make_tensor_value_info("h0", float, &state));
                    inputs.push(make_tensor_value_info("c0", float, &state));
                }
                StateLayout::Shared => {
                    inputs.push(make_tensor_value_info("state0", float, &state))
                }
            }
        }
        if self.sequence_length {
            inputs.push(make_tensor_value_info("seq_lens", DataType::Int32 as i32, &[self.batch]));
        }
        inputs
    }

    /// Graph outputs written by this scope
    pub fn outputs(&self) -> Vec<ValueInfoProto> {
        let mut names = vec![self.output_name()];
        match self.layout {
            StateLayout::Tuple => {
                names.push(self.hidden_output());
                names.push(self.cell_output());
            }
            StateLayout::Shared => names.push(self.state_output()),
        }
        names
            .into_iter()
            .map(|name| ValueInfoProto {
                name,
                ..Default::default()
            })
            .collect()
    }

    /// Value infos TensorFlow shape inference would have recorded
    pub fn value_infos(&self) -> Vec<ValueInfoProto> {
        let float = DataType::Float as i32;
        let s = &self.scope;
        let h = self.hidden as i64;
        let time_major = [self.time, self.batch, self.input_size as i64];
        vec![
            make_tensor_value_info(&format!("{}/transpose:0", s), float, &time_major),
            make_tensor_value_info(
                &format!("{}/TensorArrayStack/TensorArrayGatherV3:0", s),
                float,
                &[self.time, self.batch, h],
            ),
        ]
    }

    fn init_nodes(&self, nodes: &mut Vec<NodeProto>) -> Vec<String> {
        let s = &self.scope;
        let width = self.state_width();
        let slots: &[&str] = match self.layout {
            StateLayout::Tuple => &["h", "c"],
            StateLayout::Shared => &["state"],
        };

        slots
            .iter()
            .map(|slot| match self.init {
                InitKind::Input => format!("{}0", slot),
                InitKind::Constant(v) => {
                    let name = format!("{}/init_{}", s, slot);
                    nodes.push(const_f32(&name, &[self.batch, width as i64], &vec![v; self.batch as usize * width]));
                    format!("{}:0", name)
                }
                InitKind::Fill(v) => {
                    let base = format!("{}/LSTMCellZeroState/zeros_{}", s, slot);
                    nodes.push(const_i64(&format!("{}/dims", base), &[2], &[self.batch, width as i64]));
                    nodes.push(const_f32(&format!("{}/Const", base), &[], &[v]));
                    nodes.push(make_node(
                        "Fill",
                        &[&format!("{}/dims:0", base), &format!("{}/Const:0", base)],
                        &[&format!("{}:0", base)],
                        &base,
                    ));
                    format!("{}:0", base)
                }
            })
            .collect()
    }

    /// Nodes of this scope plus the identities feeding the graph outputs
    pub fn nodes(&self) -> Vec<NodeProto> {
        let s = self.scope.as_str();
        let w = format!("{}/while", s);
        let cell = format!("{}/lstm_cell", w);
        let h = self.hidden as i64;
        let mut nodes = Vec::new();

        // input side
        let xt = if self.batch_major {
            nodes.push(const_i64(&format!("{}/transpose/perm", s), &[3], &[1, 0, 2]));
            nodes.push(make_node(
                "Transpose",
                &["X", &format!("{}/transpose/perm:0", s)],
                &[&format!("{}/transpose:0", s)],
                &format!("{}/transpose", s),
            ));
            format!("{}/transpose:0", s)
        } else {
            "X".to_string()
        };
        if self.sequence_length {
            nodes.push(make_node(
                "Identity",
                &["seq_lens"],
                &[&format!("{}/sequence_length:0", s)],
                &format!("{}/sequence_length", s),
            ));
        }

        nodes.push(const_i64(&format!("{}/ta_size", s), &[], &[self.time]));
        for ta in ["TensorArray", "TensorArray_1"] {
            nodes.push(make_node(
                "TensorArrayV3",
                &[&format!("{}/ta_size:0", s)],
                &[&format!("{}/{}:0", s, ta), &format!("{}/{}:1", s, ta)],
                &format!("{}/{}", s, ta),
            ));
        }
        nodes.push(const_i64(&format!("{}/TensorArrayUnstack/range", s), &[self.time], &(0..self.time).collect::<Vec<_>>()));
        let scatter = format!("{}/TensorArrayUnstack/TensorArrayScatter/TensorArrayScatterV3", s);
        nodes.push(make_node(
            "TensorArrayScatterV3",
            &[
                &format!("{}/TensorArray_1:0", s),
                &format!("{}/TensorArrayUnstack/range:0", s),
                &xt,
                &format!("{}/TensorArray_1:1", s),
            ],
            &[&format!("{}:0", scatter)],
            &scatter,
        ));
        nodes.push(const_i64(&format!("{}/time", s), &[], &[0]));

        // loop variables
        let inits = self.init_nodes(&mut nodes);
        let mut vars = vec![
            ("time".to_string(), format!("{}/time:0", s), format!("{}/add:0", w)),
            (
                "ta".to_string(),
                format!("{}/TensorArray:1", s),
                format!("{}/TensorArrayWrite/TensorArrayWriteV3:0", w),
            ),
        ];
        match self.layout {
            StateLayout::Tuple => {
                vars.push(("h".to_string(), inits[0].clone(), format!("{}/mul_2:0", cell)));
                vars.push(("c".to_string(), inits[1].clone(), format!("{}/add_1:0", cell)));
            }
            StateLayout::Shared => {
                vars.push(("state".to_string(), inits[0].clone(), format!("{}/concat_1:0", cell)));
            }
        }

        let identity = |tag: &str| format!("{}/Identity_{}:0", w, tag);
        let loop_cond = format!("{}/LoopCond:0", w);
        for (tag, entry, next) in &vars {
            let enter = format!("{}/Enter_{}", w, tag);
            let merge = format!("{}/Merge_{}", w, tag);
            let switch = format!("{}/Switch_{}", w, tag);
            let next_iter = format!("{}/NextIteration_{}", w, tag);
            nodes.push(make_node("Enter", &[entry], &[&format!("{}:0", enter)], &enter));
            nodes.push(make_node(
                "Merge",
                &[&format!("{}:0", enter), &format!("{}:0", next_iter)],
                &[&format!("{}:0", merge)],
                &merge,
            ));
            nodes.push(make_node(
                "Switch",
                &[&format!("{}:0", merge), &loop_cond],
                &[&format!("{}:0", switch), &format!("{}:1", switch)],
                &switch,
            ));
            nodes.push(make_node(
                "Identity",
                &[&format!("{}:1", switch)],
                &[&identity(tag)],
                &format!("{}/Identity_{}", w, tag),
            ));
            nodes.push(make_node(
                "Exit",
                &[&format!("{}:0", switch)],
                &[&format!("{}/Exit_{}:0", w, tag)],
                &format!("{}/Exit_{}", w, tag),
            ));
            nodes.push(make_node("NextIteration", &[next], &[&format!("{}:0", next_iter)], &next_iter));
        }

        nodes.push(const_i64(&format!("{}/Less/y", w), &[], &[self.time]));
        nodes.push(make_node(
            "Less",
            &[&identity("time"), &format!("{}/Less/y:0", w)],
            &[&format!("{}/Less:0", w)],
            &format!("{}/Less", w),
        ));
        nodes.push(make_node("LoopCond", &[&format!("{}/Less:0", w)], &[&loop_cond], &format!("{}/LoopCond", w)));
        nodes.push(const_i64(&format!("{}/add/y", w), &[], &[1]));
        nodes.push(make_node(
            "Add",
            &[&identity("time"), &format!("{}/add/y:0", w)],
            &[&format!("{}/add:0", w)],
            &format!("{}/add", w),
        ));

        // cell body
        nodes.push(make_node(
            "TensorArrayReadV3",
            &[&format!("{}/TensorArray_1:0", s), &identity("time"), &format!("{}:0", scatter)],
            &[&format!("{}/TensorArrayReadV3:0", w)],
            &format!("{}/TensorArrayReadV3", w),
        ));

        let (h_prev, c_prev) = match self.layout {
            StateLayout::Tuple => (identity("h"), identity("c")),
            StateLayout::Shared => {
                for (name, begin) in [("Slice", 0), ("Slice_1", h)] {
                    let base = format!("{}/{}", cell, name);
                    nodes.push(const_i64(&format!("{}/begin", base), &[2], &[0, begin]));
                    nodes.push(const_i64(&format!("{}/size", base), &[2], &[-1, h]));
                    nodes.push(make_node(
                        "Slice",
                        &[&identity("state"), &format!("{}/begin:0", base), &format!("{}/size:0", base)],
                        &[&format!("{}:0", base)],
                        &base,
                    ));
                }
                (format!("{}/Slice_1:0", cell), format!("{}/Slice:0", cell))
            }
        };

        let t = |name: &str| format!("{}/{}:0", cell, name);
        let n = |name: &str| format!("{}/{}", cell, name);

        nodes.push(const_i64(&n("concat/axis"), &[], &[1]));
        nodes.push(make_node(
            "ConcatV2",
            &[&format!("{}/TensorArrayReadV3:0", w), &h_prev, &t("concat/axis")],
            &[&t("concat")],
            &n("concat"),
        ));

        let kernel = self.kernel();
        let bias = self.bias();
        let kernel_name = format!("{}/lstm_cell/kernel", s);
        let bias_name = format!("{}/lstm_cell/bias", s);
        nodes.push(const_f32(
            &kernel_name,
            &[kernel.nrows() as i64, kernel.ncols() as i64],
            &kernel.iter().copied().collect::<Vec<_>>(),
        ));
        nodes.push(const_f32(&bias_name, &[bias.len() as i64], &bias.to_vec()));
        nodes.push(make_node("Enter", &[&format!("{}:0", kernel_name)], &[&t("MatMul/Enter")], &n("MatMul/Enter")));
        nodes.push(make_node("MatMul", &[&t("concat"), &t("MatMul/Enter")], &[&t("MatMul")], &n("MatMul")));
        nodes.push(make_node("Enter", &[&format!("{}:0", bias_name)], &[&t("BiasAdd/Enter")], &n("BiasAdd/Enter")));
        nodes.push(make_node("BiasAdd", &[&t("MatMul"), &t("BiasAdd/Enter")], &[&t("BiasAdd")], &n("BiasAdd")));

        nodes.push(const_i64(&n("split/split_dim"), &[], &[1]));
        let gates: Vec<String> = (0..4).map(|i| format!("{}/split:{}", cell, i)).collect();
        let gate_refs: Vec<&str> = gates.iter().map(String::as_str).collect();
        nodes.push(make_node("Split", &[&t("split/split_dim"), &t("BiasAdd")], &gate_refs, &n("split")));

        nodes.push(const_f32(&n("add/y"), &[], &[self.forget_bias]));
        nodes.push(make_node("Add", &[&gates[2], &t("add/y")], &[&t("add")], &n("add")));
        nodes.push(make_node("Sigmoid", &[&t("add")], &[&t("Sigmoid")], &n("Sigmoid")));
        nodes.push(make_node("Mul", &[&t("Sigmoid"), &c_prev], &[&t("mul")], &n("mul")));
        nodes.push(make_node("Sigmoid", &[&gates[0]], &[&t("Sigmoid_1")], &n("Sigmoid_1")));
        nodes.push(make_node("Tanh", &[&gates[1]], &[&t("Tanh")], &n("Tanh")));
        nodes.push(make_node("Mul", &[&t("Sigmoid_1"), &t("Tanh")], &[&t("mul_1")], &n("mul_1")));
        nodes.push(make_node("Add", &[&t("mul"), &t("mul_1")], &[&t("add_1")], &n("add_1")));
        nodes.push(make_node("Sigmoid", &[&gates[3]], &[&t("Sigmoid_2")], &n("Sigmoid_2")));
        nodes.push(make_node("Tanh", &[&t("add_1")], &[&t("Tanh_1")], &n("Tanh_1")));
        // operands swapped to exercise commutative matching
        nodes.push(make_node("Mul", &[&t("Tanh_1"), &t("Sigmoid_2")], &[&t("mul_2")], &n("mul_2")));

        if self.layout == StateLayout::Shared {
            nodes.push(const_i64(&n("concat_1/axis"), &[], &[1]));
            nodes.push(make_node(
                "ConcatV2",
                &[&t("add_1"), &t("mul_2"), &t("concat_1/axis")],
                &[&t("concat_1")],
                &n("concat_1"),
            ));
        }

        let write = format!("{}/TensorArrayWrite/TensorArrayWriteV3", w);
        nodes.push(make_node(
            "TensorArrayWriteV3",
            &[&format!("{}/TensorArray:0", s), &identity("time"), &t("mul_2"), &identity("ta")],
            &[&format!("{}:0", write)],
            &write,
        ));

        // after the loop
        let exit_ta = format!("{}/Exit_ta:0", w);
        let stack = format!("{}/TensorArrayStack", s);
        nodes.push(make_node(
            "TensorArraySizeV3",
            &[&format!("{}/TensorArray:0", s), &exit_ta],
            &[&format!("{}/TensorArraySizeV3:0", stack)],
            &format!("{}/TensorArraySizeV3", stack),
        ));
        nodes.push(const_i64(&format!("{}/range", stack), &[self.time], &(0..self.time).collect::<Vec<_>>()));
        let gathered = format!("{}/TensorArrayGatherV3:0", stack);
        nodes.push(make_node(
            "TensorArrayGatherV3",
            &[&format!("{}/TensorArray:0", s), &format!("{}/range:0", stack), &exit_ta],
            &[&gathered],
            &format!("{}/TensorArrayGatherV3", stack),
        ));
        if self.extra_output_reader {
            nodes.push(make_node("Identity", &[&exit_ta], &[&format!("{}/peek:0", s)], &format!("{}/peek", s)));
        }

        let outputs = if self.batch_major {
            nodes.push(const_i64(&format!("{}/transpose_1/perm", s), &[3], &[1, 0, 2]));
            nodes.push(make_node(
                "Transpose",
                &[&gathered, &format!("{}/transpose_1/perm:0", s)],
                &[&format!("{}/transpose_1:0", s)],
                &format!("{}/transpose_1", s),
            ));
            format!("{}/transpose_1:0", s)
        } else {
            gathered
        };

        let tag = self.tag();
        nodes.push(make_node("Identity", &[&outputs], &[&self.output_name()], &format!("{}_outputs", tag)));
        match self.layout {
            StateLayout::Tuple => {
                nodes.push(make_node("Identity", &[&format!("{}/Exit_h:0", w)], &[&self.hidden_output()], &format!("{}_h", tag)));
                nodes.push(make_node("Identity", &[&format!("{}/Exit_c:0", w)], &[&self.cell_output()], &format!("{}_c", tag)));
            }
            StateLayout::Shared => {
                nodes.push(make_node(
                    "Identity",
                    &[&format!("{}/Exit_state:0", w)],
                    &[&self.state_output()],
                    &format!("{}_state", tag),
                ));
            }
        }

        nodes
    }

    pub fn graph(&self) -> GraphProto {
        merge_graphs(std::slice::from_ref(self))
    }

    pub fn model(&self, opset: i64) -> ModelProto {
        model_of(self.graph(), opset)
    }
}

/// One graph holding several scopes; shared graph inputs appear once
pub fn merge_graphs(scopes: &[RnnGraph]) -> GraphProto {
    let mut graph = GraphProto {
        name: "tf2onnx".to_string(),
        ..Default::default()
    };
    for scope in scopes {
        graph.node.extend(scope.nodes());
        for input in scope.inputs() {
            if !graph.input.iter().any(|i| i.name == input.name) {
                graph.input.push(input);
            }
        }
        graph.output.extend(scope.outputs());
        graph.value_info.extend(scope.value_infos());
    }
    graph
}

pub fn model_of(graph: GraphProto, opset: i64) -> ModelProto {
    ModelProto {
        ir_version: 7,
        producer_name: "tf2onnx".to_string(),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: opset,
        }],
        graph: Some(graph),
        ..Default::default()
    }
}

pub fn const_f32(name: &str, dims: &[i64], data: &[f32]) -> NodeProto {
    let tensor = TensorProto {
        dims: dims.to_vec(),
        data_type: DataType::Float as i32,
        float_data: data.to_vec(),
        ..Default::default()
    };
    const_node(name, tensor)
}

pub fn const_i64(name: &str, dims: &[i64], data: &[i64]) -> NodeProto {
    let tensor = TensorProto {
        dims: dims.to_vec(),
        data_type: DataType::Int64 as i32,
        int64_data: data.to_vec(),
        ..Default::default()
    };
    const_node(name, tensor)
}

fn const_node(name: &str, tensor: TensorProto) -> NodeProto {
    let mut node = make_node("Const", &[], &[&format!("{}:0", name)], name);
    node.attribute.push(AttributeProto::new_tensor("value", tensor));
    node
}

/// Op types TensorFlow control flow leaves in a graph
pub const TF_LOOP_OPS: &[&str] = &[
    "Enter",
    "Exit",
    "Merge",
    "Switch",
    "LoopCond",
    "NextIteration",
    "TensorArrayV3",
    "TensorArrayReadV3",
    "TensorArrayWriteV3",
    "TensorArrayGatherV3",
    "TensorArrayScatterV3",
    "TensorArraySizeV3",
];

/// The single fused node of `ctx`
pub fn lstm_node(ctx: &GraphContext) -> NodeProto {
    let nodes = ctx.find_nodes_by_op("LSTM");
    assert_eq!(nodes.len(), 1, "expected exactly one LSTM node");
    nodes[0].clone()
}

/// Reference evaluator for the glue ops inserted around the fused node
pub struct Evaluator<'g> {
    ctx: &'g GraphContext,
    values: FxHashMap<String, ArrayD<f64>>,
}

impl<'g> Evaluator<'g> {
    pub fn new(ctx: &'g GraphContext) -> Self {
        Self {
            ctx,
            values: FxHashMap::default(),
        }
    }

    /// Bind a graph input
    pub fn feed(mut self, name: &str, value: ArrayD<f64>) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn eval(&mut self, tensor: &str) -> ArrayD<f64> {
        if let Some(v) = self.values.get(tensor) {
            return v.clone();
        }
        if let Some(t) = self.ctx.get_constant_tensor(tensor) {
            return tensor_to_array_f64(t).unwrap();
        }
        let node = self
            .ctx
            .get_producer(tensor)
            .unwrap_or_else(|| panic!("{} has no value", tensor))
            .clone();

        let value = match node.op_type.as_str() {
            "Identity" | "Cast" => self.eval(&node.input[0]),
            "Shape" => {
                let x = self.eval(&node.input[0]);
                let dims: Vec<f64> = x.shape().iter().map(|&d| d as f64).collect();
                ArrayD::from_shape_vec(IxDyn(&[dims.len()]), dims).unwrap()
            }
            "Slice" => self.slice(&node),
            "Concat" => {
                let parts: Vec<ArrayD<f64>> = node.input.iter().map(|i| self.eval(i)).collect();
                let axis = axis(node.get_attribute_int("axis", 0), parts[0].ndim());
                let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
                concatenate(Axis(axis), &views).unwrap()
            }
            "Tile" => {
                let mut data = self.eval(&node.input[0]);
                let repeats = self.eval(&node.input[1]);
                for (a, &r) in repeats.iter().enumerate() {
                    let copies: Vec<_> = (0..r as usize).map(|_| data.view()).collect();
                    data = concatenate(Axis(a), &copies).unwrap();
                }
                data
            }
            "Squeeze" => {
                let mut data = self.eval(&node.input[0]);
                let mut axes: Vec<usize> = self.axes(&node).iter().map(|&a| axis(a, data.ndim())).collect();
                axes.sort_unstable_by(|a, b| b.cmp(a));
                for a in axes {
                    data = data.index_axis_move(Axis(a), 0);
                }
                data
            }
            "Unsqueeze" => {
                let mut data = self.eval(&node.input[0]);
                let mut axes = self.axes(&node);
                axes.sort_unstable();
                for a in axes {
                    data = data.insert_axis(Axis(a as usize));
                }
                data
            }
            "Transpose" => {
                let data = self.eval(&node.input[0]);
                let perm: Vec<usize> = node
                    .get_attribute_ints("perm")
                    .unwrap()
                    .iter()
                    .map(|&p| p as usize)
                    .collect();
                data.permuted_axes(IxDyn(&perm)).as_standard_layout().to_owned()
            }
            other => panic!("evaluator does not support {}", other),
        };

        self.values.insert(tensor.to_string(), value.clone());
        value
    }

    fn ints(&mut self, tensor: &str) -> Vec<i64> {
        self.eval(tensor).iter().map(|&v| v as i64).collect()
    }

    fn axes(&mut self, node: &NodeProto) -> Vec<i64> {
        match node.get_attribute_ints("axes") {
            Some(axes) => axes.to_vec(),
            None => self.ints(&node.input[1]),
        }
    }

    fn slice(&mut self, node: &NodeProto) -> ArrayD<f64> {
        let mut data = self.eval(&node.input[0]);
        let (starts, ends, axes) = match node.get_attribute_ints("starts") {
            Some(starts) => (
                starts.to_vec(),
                node.get_attribute_ints("ends").unwrap().to_vec(),
                node.get_attribute_ints("axes").unwrap().to_vec(),
            ),
            None => (
                self.ints(&node.input[1]),
                self.ints(&node.input[2]),
                self.ints(&node.input[3]),
            ),
        };
        for ((start, end), a) in starts.iter().zip(&ends).zip(&axes) {
            let a = axis(*a, data.ndim());
            let len = data.shape()[a] as i64;
            let end = (*end).min(len);
            data.slice_axis_inplace(Axis(a), Slice::from(*start as isize..end as isize));
        }
        data.as_standard_layout().to_owned()
    }
}

fn axis(a: i64, rank: usize) -> usize {
    if a < 0 {
        (a + rank as i64) as usize
    } else {
        a as usize
    }
}
