use ethers::prelude::abigen;

// Generates the bindings for the `DisputeGameFactory` contract.
abigen!(
    DisputeGameFactory,
    r"[
        function gameCount() external view returns (uint256)
        function gameAtIndex(uint256 _index) external view returns (uint8 gameType, uint64 timestamp, address proxy)
        function create(uint8 gameType, bytes32 rootClaim, bytes calldata extraData) external returns (address proxy)
    ]"
);

// Generates the bindings for the `FaultDisputeGame` contract.
abigen!(
    FaultDisputeGame,
    r"[
        function claimDataLen() external view returns (uint256)
        function claimData(uint256 _index) external view returns (uint32 parentIndex, bool countered, bytes32 claim, uint128 position, uint128 clock)
        function attack(uint256 _parentIndex, bytes32 _claim) external payable
        function defend(uint256 _parentIndex, bytes32 _claim) external payable
        function step(uint256 _claimIndex, bool _isAttack, bytes calldata _stateData, bytes calldata _proof) external
        function resolve() external returns (uint8)
        function status() external view returns (uint8)
    ]"
);
