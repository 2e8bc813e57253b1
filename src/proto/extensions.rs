//! Extension methods for ONNX protobuf types
//!
//! Provides convenient helper methods for working with ONNX protobuf types.

use super::onnx::*;

// ============================================================================
// ModelProto extensions
// ============================================================================

impl ModelProto {
    /// Get the opset version for the default domain
    pub fn get_opset_version(&self) -> Option<i64> {
        self.opset_import
            .iter()
            .find(|op| op.domain.is_empty() || op.domain == "ai.onnx")
            .map(|op| op.version)
    }
}

// ============================================================================
// NodeProto extensions
// ============================================================================

impl NodeProto {
    /// Get attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|attr| attr.name == name)
    }

    /// Get integer attribute value with default
    pub fn get_attribute_int(&self, name: &str, default: i64) -> i64 {
        self.get_attribute(name).map(|a| a.i).unwrap_or(default)
    }

    /// Get string attribute value (UTF-8)
    pub fn get_attribute_str(&self, name: &str) -> Option<&str> {
        self.get_attribute(name)
            .and_then(|a| std::str::from_utf8(&a.s).ok())
    }

    /// Get repeated int attribute
    pub fn get_attribute_ints(&self, name: &str) -> Option<&[i64]> {
        self.get_attribute(name).map(|a| a.ints.as_slice())
    }

    /// Get tensor attribute
    pub fn get_attribute_tensor(&self, name: &str) -> Option<&TensorProto> {
        self.get_attribute(name).and_then(|a| a.t.as_ref())
    }

    /// Check if this node has a specific op type
    pub fn is_op_type(&self, op_type: &str) -> bool {
        self.op_type == op_type
    }

    /// Check if this node's op type is in the given list
    pub fn is_op_type_in(&self, op_types: &[&str]) -> bool {
        op_types.contains(&self.op_type.as_str())
    }
}

// ============================================================================
// ValueInfoProto extensions
// ============================================================================

impl ValueInfoProto {
    /// Get the shape dimensions if available
    ///
    /// Symbolic and missing dimensions are reported as -1.
    pub fn get_shape(&self) -> Option<Vec<i64>> {
        self.r#type.as_ref().and_then(|t| {
            t.value.as_ref().and_then(|v| match v {
                type_proto::Value::TensorType(tensor) => tensor.shape.as_ref().map(|s| {
                    s.dim
                        .iter()
                        .map(|d| match &d.value {
                            Some(tensor_shape_proto::dimension::Value::DimValue(v)) => *v,
                            Some(tensor_shape_proto::dimension::Value::DimParam(_)) => -1,
                            None => -1,
                        })
                        .collect()
                }),
            })
        })
    }

    /// Get the element type if this is a tensor type
    pub fn get_elem_type(&self) -> Option<i32> {
        self.r#type.as_ref().and_then(|t| {
            t.value.as_ref().map(|v| match v {
                type_proto::Value::TensorType(tensor) => tensor.elem_type,
            })
        })
    }
}

// ============================================================================
// TensorProto extensions
// ============================================================================

impl TensorProto {
    /// Get the total number of elements
    pub fn num_elements(&self) -> usize {
        if self.dims.is_empty() {
            1 // scalar
        } else {
            self.dims.iter().map(|&d| d.max(0) as usize).product()
        }
    }

    /// Get data type enum value
    pub fn data_type_enum(&self) -> tensor_proto::DataType {
        tensor_proto::DataType::try_from(self.data_type)
            .unwrap_or(tensor_proto::DataType::Undefined)
    }
}

// ============================================================================
// AttributeProto extensions
// ============================================================================

impl AttributeProto {
    /// Create a new integer attribute
    pub fn new_int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            i: value,
            r#type: attribute_proto::AttributeType::Int as i32,
            ..Default::default()
        }
    }

    /// Create a new ints attribute
    pub fn new_ints(name: &str, values: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            ints: values,
            r#type: attribute_proto::AttributeType::Ints as i32,
            ..Default::default()
        }
    }

    /// Create a new string attribute
    pub fn new_string(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            s: value.as_bytes().to_vec(),
            r#type: attribute_proto::AttributeType::String as i32,
            ..Default::default()
        }
    }

    /// Create a new tensor attribute
    pub fn new_tensor(name: &str, value: TensorProto) -> Self {
        Self {
            name: name.to_string(),
            t: Some(value),
            r#type: attribute_proto::AttributeType::Tensor as i32,
            ..Default::default()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Create a new ValueInfoProto for a tensor
pub fn make_tensor_value_info(name: &str, elem_type: i32, shape: &[i64]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type,
                shape: Some(TensorShapeProto {
                    dim: shape
                        .iter()
                        .map(|&d| tensor_shape_proto::Dimension {
                            // unknown extents stay unset
                            value: (d >= 0)
                                .then_some(tensor_shape_proto::dimension::Value::DimValue(d)),
                            denotation: String::new(),
                        })
                        .collect(),
                }),
            })),
            denotation: String::new(),
        }),
        doc_string: String::new(),
    }
}

/// Create a new NodeProto
pub fn make_node(op_type: &str, inputs: &[&str], outputs: &[&str], name: &str) -> NodeProto {
    NodeProto {
        op_type: op_type.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        name: name.to_string(),
        ..Default::default()
    }
}
