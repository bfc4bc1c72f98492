use pool1d_rs::nn::{Pool1d, PoolingMethod, PoolingParameters};
use pool1d_rs::tensor::{TensorError, TensorView};

#[test]
fn test_configure_from_json() {
    let json = r#"{
        "kernel_size": 2,
        "stride": 1,
        "padding_before": 1,
        "padding_after": 1,
        "dimension_index": 0,
        "method": "sum"
    }"#;
    let params: PoolingParameters = serde_json::from_str(json).unwrap();
    let layer = Pool1d::configure(params).unwrap();

    let data = vec![2.0f32, 2.0, 2.0];
    let input = TensorView::contiguous(&data, &[3]).unwrap();
    let out = layer.forward(&input).unwrap();
    assert_eq!(out.value.data(), &[2.0, 4.0, 4.0, 2.0]);
}

#[test]
fn test_configure_rejects_invalid_json_config() {
    let params: PoolingParameters = serde_json::from_str(r#"{ "kernel_size": 0 }"#).unwrap();
    let err = Pool1d::configure(params);
    assert!(matches!(err, Err(TensorError::InvalidConfiguration(_))));
}

#[test]
fn test_unknown_method_is_rejected() {
    let err = serde_json::from_str::<PoolingParameters>(r#"{ "kernel_size": 2, "method": "median" }"#);
    assert!(err.is_err());
}

#[test]
fn test_parameters_serialize() {
    let params = PoolingParameters::new(3, 2)
        .unwrap()
        .with_method(PoolingMethod::Average)
        .with_prediction_stage(true);
    let value = serde_json::to_value(params).unwrap();
    assert_eq!(value["kernel_size"], 3);
    assert_eq!(value["stride"], 2);
    assert_eq!(value["method"], "average");
    assert_eq!(value["prediction_stage"], true);

    let back: PoolingParameters = serde_json::from_value(value).unwrap();
    assert_eq!(back, params);
}
